//! # MaternalCare存储模块
//!
//! 以键值存储承载的 JSON 文档集合，以及患者、产程图、转诊的仓储接口。

pub mod collection;
pub mod repository;
pub mod storage;

pub use collection::JsonCollection;
pub use repository::{
    LocalStore, PartographRepository, PatientRepository, ReferralRepository, PARTOGRAPHS_KEY,
    PATIENTS_KEY, REFERRALS_KEY,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
