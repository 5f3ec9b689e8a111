use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a `GoldenImage`. Stored as text in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoldenImageStatus {
    Creating,
    Ready,
    Failed,
}

impl GoldenImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoldenImageStatus::Creating => "creating",
            GoldenImageStatus::Ready => "ready",
            GoldenImageStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for GoldenImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(GoldenImageStatus::Creating),
            "ready" => Ok(GoldenImageStatus::Ready),
            "failed" => Ok(GoldenImageStatus::Failed),
            other => Err(format!("unknown golden image status: {other}")),
        }
    }
}

impl std::fmt::Display for GoldenImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a `VMInstance`. Stored as text in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VmInstanceStatus {
    Starting,
    Ready,
    Busy,
    Failed,
}

impl VmInstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmInstanceStatus::Starting => "starting",
            VmInstanceStatus::Ready => "ready",
            VmInstanceStatus::Busy => "busy",
            VmInstanceStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for VmInstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(VmInstanceStatus::Starting),
            "ready" => Ok(VmInstanceStatus::Ready),
            "busy" => Ok(VmInstanceStatus::Busy),
            "failed" => Ok(VmInstanceStatus::Failed),
            other => Err(format!("unknown vm instance status: {other}")),
        }
    }
}

impl std::fmt::Display for VmInstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoldenImage {
    pub id: Uuid,
    pub vm_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VmInstance {
    pub id: Uuid,
    pub container_id: Option<String>,
    pub vm_type: String,
    pub status: String,
    pub port: Option<i32>,
    pub is_hot_spare: bool,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VmInstance {
    /// RDP is always VNC/console port + 1000, never stored separately.
    pub fn rdp_port(&self) -> Option<i32> {
        self.port.map(|p| p + 1000)
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct VmTypeParam {
    pub vm_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateGoldenImageResp {
    pub golden_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GoldenImageReadyResp {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateInstanceResp {
    pub instance_id: Uuid,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct AssignParams {
    pub assigned_to: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignmentInfo {
    pub instance_id: Uuid,
    pub container_id: Option<String>,
    pub port: i32,
    pub console_url: String,
    pub rdp_port: i32,
}

#[derive(Debug, Clone, Serialize, Default, ToSchema)]
pub struct OkResponse {
    pub status: String,
    pub message: String,
}

impl OkResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VmSummary {
    pub instance_id: Uuid,
    pub container_id: Option<String>,
    pub vm_type: String,
    pub status: String,
    pub port: Option<i32>,
    pub is_hot_spare: bool,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<VmInstance> for VmSummary {
    fn from(vm: VmInstance) -> Self {
        Self {
            instance_id: vm.id,
            container_id: vm.container_id,
            vm_type: vm.vm_type,
            status: vm.status,
            port: vm.port,
            is_hot_spare: vm.is_hot_spare,
            assigned_to: vm.assigned_to,
            created_at: vm.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListInstancesResp {
    pub items: Vec<VmSummary>,
}

/// The two entity kinds a MAC sidecar can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    GoldenImage,
    VmInstance,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::GoldenImage => "golden_image",
            EntityKind::VmInstance => "vm_instance",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookResp {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusCheckResp {
    pub registered: bool,
    pub kind: EntityKind,
    pub id: Uuid,
}
