//! # 孕产妇保健工作流模块
//!
//! 提供登记与临床流程管理功能，包括：
//! - 产程进展评估：警戒线/处理线分区与停滞、回退标记
//! - 状态机：产程图与转诊的生命周期
//! - 产程图、转诊、患者登记与疫苗接种日程
//! - 会话上下文与机构目录

pub mod directory;
pub mod engine;
pub mod partograph;
pub mod progress;
pub mod referral;
pub mod registry;
pub mod session;
pub mod state_machine;
pub mod vaccination;

// 重新导出主要类型
pub use directory::HealthDirectory;
pub use engine::{RegistryStatistics, WorkflowEngine};
pub use partograph::{
    progress_points, ObservationInput, PartographAssessment, PartographDesk, TransferRequest,
    VitalFlag, VitalThresholds,
};
pub use progress::{
    PointAssessment, ProgressConfig, ProgressEvaluator, ProgressPoint, ProgressReport, ProgressZone,
    ReviewFlag,
};
pub use referral::ReferralDesk;
pub use registry::{NewPatient, PatientRegistry};
pub use session::{CredentialVerifier, RoleSelection, Section, Session, StaticCredentials};
pub use state_machine::{
    PartographEvent, PartographStateMachine, ReferralEvent, ReferralStateMachine, StateMachine,
};
pub use vaccination::{DoseEntry, DoseStatus, VatDose};
