//! 破伤风疫苗(VAT)接种日程

use chrono::{Duration, Months, NaiveDate};
use maternal_core::{MaternalError, Result};
use serde::{Deserialize, Serialize};

/// 接种剂次
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VatDose {
    Vat1,
    Vat2,
    Vat3,
    Vat4,
    Vat5,
}

impl VatDose {
    pub const ALL: [VatDose; 5] = [
        VatDose::Vat1,
        VatDose::Vat2,
        VatDose::Vat3,
        VatDose::Vat4,
        VatDose::Vat5,
    ];

    /// 按接种顺序（从0开始）取剂次
    pub fn from_index(index: usize) -> Option<VatDose> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 距上一剂的最早接种日期；首剂在首次接触时接种
    pub fn earliest_after(self, previous: NaiveDate) -> Option<NaiveDate> {
        match self {
            VatDose::Vat1 => Some(previous),
            VatDose::Vat2 => previous.checked_add_signed(Duration::weeks(4)),
            VatDose::Vat3 => previous.checked_add_months(Months::new(6)),
            VatDose::Vat4 | VatDose::Vat5 => previous.checked_add_months(Months::new(12)),
        }
    }
}

/// 剂次状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseStatus {
    Done,      // 已接种
    Pending,   // 到期待接种
    Scheduled, // 未到期
}

/// 日程条目；已接种为接种日期，其余为应接种日期
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseEntry {
    pub dose: VatDose,
    pub status: DoseStatus,
    pub date: NaiveDate,
}

fn check_recorded(vat_dates: &[NaiveDate]) -> Result<()> {
    if vat_dates.len() > VatDose::ALL.len() {
        return Err(MaternalError::Validation(format!(
            "VAT 接种记录最多 {} 剂，实际 {} 剂",
            VatDose::ALL.len(),
            vat_dates.len()
        )));
    }
    if vat_dates.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(MaternalError::Validation("VAT 接种日期必须按时间顺序".to_string()));
    }
    Ok(())
}

fn date_overflow(dose: VatDose) -> MaternalError {
    MaternalError::Internal(format!("{:?} 应接种日期超出范围", dose))
}

/// 根据已接种日期生成五剂日程
pub fn schedule(vat_dates: &[NaiveDate], today: NaiveDate) -> Result<Vec<DoseEntry>> {
    check_recorded(vat_dates)?;

    let mut entries = Vec::with_capacity(VatDose::ALL.len());
    let mut previous = today;
    let mut pending_assigned = false;

    for dose in VatDose::ALL {
        let entry = match vat_dates.get(dose.index()) {
            Some(&given) => DoseEntry {
                dose,
                status: DoseStatus::Done,
                date: given,
            },
            None => {
                let due = dose.earliest_after(previous).ok_or_else(|| date_overflow(dose))?;
                let status = if !pending_assigned && due <= today {
                    DoseStatus::Pending
                } else {
                    DoseStatus::Scheduled
                };
                pending_assigned = true;
                DoseEntry { dose, status, date: due }
            }
        };
        previous = entry.date;
        entries.push(entry);
    }

    Ok(entries)
}

/// 下一剂应接种的条目，全部完成时为 None
pub fn next_dose(vat_dates: &[NaiveDate], today: NaiveDate) -> Result<Option<DoseEntry>> {
    Ok(schedule(vat_dates, today)?
        .into_iter()
        .find(|e| e.status != DoseStatus::Done))
}

/// 校验新接种日期并返回对应剂次
pub fn validate_next_dose(vat_dates: &[NaiveDate], date: NaiveDate) -> Result<VatDose> {
    check_recorded(vat_dates)?;

    let dose = VatDose::from_index(vat_dates.len())
        .ok_or_else(|| MaternalError::Workflow("VAT 五剂已全部完成".to_string()))?;

    if let Some(&previous) = vat_dates.last() {
        let earliest = dose.earliest_after(previous).ok_or_else(|| date_overflow(dose))?;
        if date < earliest {
            return Err(MaternalError::Validation(format!(
                "{:?} 最早接种日期为 {}，不能在 {} 接种",
                dose, earliest, date
            )));
        }
    }

    Ok(dose)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_first_contact_schedule() {
        let today = d(2024, 3, 12);
        let entries = schedule(&[], today).unwrap();

        assert_eq!(entries[0], DoseEntry { dose: VatDose::Vat1, status: DoseStatus::Pending, date: today });
        assert_eq!(entries[1].date, d(2024, 4, 9));
        assert_eq!(entries[2].date, d(2024, 10, 9));
        assert_eq!(entries[3].date, d(2025, 10, 9));
        assert_eq!(entries[4].date, d(2026, 10, 9));
        assert!(entries[1..].iter().all(|e| e.status == DoseStatus::Scheduled));
    }

    #[test]
    fn test_pending_when_due() {
        let entries = schedule(&[d(2024, 3, 12)], d(2024, 5, 15)).unwrap();

        assert_eq!(entries[0].status, DoseStatus::Done);
        assert_eq!(entries[1].status, DoseStatus::Pending);
        assert_eq!(entries[1].date, d(2024, 4, 9));
        assert_eq!(entries[2].status, DoseStatus::Scheduled);
        assert_eq!(entries[2].date, d(2024, 10, 9));
    }

    #[test]
    fn test_scheduled_before_due() {
        let next = next_dose(&[d(2024, 3, 12), d(2024, 4, 10)], d(2024, 6, 1)).unwrap().unwrap();
        assert_eq!(next.dose, VatDose::Vat3);
        assert_eq!(next.status, DoseStatus::Scheduled);
        assert_eq!(next.date, d(2024, 10, 10));
    }

    #[test]
    fn test_complete_course() {
        let dates = [d(2020, 1, 1), d(2020, 2, 1), d(2020, 9, 1), d(2021, 9, 1), d(2022, 9, 1)];
        assert!(next_dose(&dates, d(2024, 1, 1)).unwrap().is_none());
        assert!(matches!(
            validate_next_dose(&dates, d(2024, 1, 1)),
            Err(MaternalError::Workflow(_))
        ));
    }

    #[test]
    fn test_validate_minimum_interval() {
        let dates = [d(2024, 3, 12)];
        assert!(validate_next_dose(&dates, d(2024, 3, 30)).is_err());
        assert_eq!(validate_next_dose(&dates, d(2024, 4, 9)).unwrap(), VatDose::Vat2);
        assert_eq!(validate_next_dose(&[], d(2024, 1, 1)).unwrap(), VatDose::Vat1);
    }

    #[test]
    fn test_rejects_unordered_history() {
        assert!(schedule(&[d(2024, 5, 1), d(2024, 3, 1)], d(2024, 6, 1)).is_err());
    }
}
