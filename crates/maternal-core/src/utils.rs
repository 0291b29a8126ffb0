//! 通用工具函数

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 患者编号前缀
pub const PATIENT_ID_PREFIX: &str = "PAT";
/// 产程图编号前缀
pub const PARTOGRAPH_ID_PREFIX: &str = "PTG";
/// 产程观察编号前缀
pub const OBSERVATION_ID_PREFIX: &str = "OBS";
/// 转诊编号前缀
pub const REFERRAL_ID_PREFIX: &str = "REF";

/// 生成带前缀的记录编号，例如 `REF-3F2A9C1B`
pub fn generate_record_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, suffix[..8].to_uppercase())
}

/// 验证记录编号格式
pub fn is_valid_record_id(id: &str, prefix: &str) -> bool {
    match id.split_once('-') {
        Some((head, tail)) => {
            head == prefix && !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// 两个时间点之间的小时数（可为负），精确到毫秒
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    to.signed_duration_since(from).num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_generate_record_id() {
        let id = generate_record_id(REFERRAL_ID_PREFIX);
        assert!(id.starts_with("REF-"));
        assert_eq!(id.len(), 12);
        assert!(is_valid_record_id(&id, REFERRAL_ID_PREFIX));
        assert_ne!(id, generate_record_id(REFERRAL_ID_PREFIX));
    }

    #[test]
    fn test_is_valid_record_id() {
        assert!(is_valid_record_id("PAT-0001", PATIENT_ID_PREFIX));
        assert!(!is_valid_record_id("PAT-", PATIENT_ID_PREFIX));
        assert!(!is_valid_record_id("REF-0001", PATIENT_ID_PREFIX));
        assert!(!is_valid_record_id("PAT0001", PATIENT_ID_PREFIX));
    }

    #[test]
    fn test_hours_between() {
        let start = Utc::now();
        assert_eq!(hours_between(start, start + Duration::minutes(90)), 1.5);
        assert_eq!(hours_between(start + Duration::hours(2), start), -2.0);
    }

    #[test]
    fn test_hours_between_sub_second() {
        let start = Utc::now();
        let half_second = hours_between(start, start + Duration::milliseconds(500));
        assert!(half_second > 0.0);
        assert!((half_second - 500.0 / 3_600_000.0).abs() < 1e-12);
        assert!(hours_between(start, start + Duration::milliseconds(1)) > 0.0);
    }
}
