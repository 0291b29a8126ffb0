//! 患者登记
//!
//! 登记孕妇、检索、产前检查记录与疫苗接种

use crate::vaccination::{self, DoseEntry, VatDose};
use chrono::NaiveDate;
use maternal_core::utils::{generate_record_id, PATIENT_ID_PREFIX};
use maternal_core::{
    Antecedents, EvolutionRecord, MaternalError, Patient, PreventiveMeasures, ResidenceCategory,
    Result, RiskLevel,
};
use maternal_storage::PatientRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MIN_AGE: u8 = 10;
const MAX_AGE: u8 = 60;

/// 登记请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPatient {
    pub name: String,
    pub postname: Option<String>,
    pub age: u8,
    pub phone: String,
    pub national_id: Option<String>,
    pub risk_level: RiskLevel,
    pub structure_id: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub civil_status: Option<String>,
    pub residence: Option<ResidenceCategory>,
    pub gestational_age: Option<u8>,
    pub antecedents: Option<Antecedents>,
}

impl NewPatient {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MaternalError::Validation("姓名不能为空".to_string()));
        }
        if self.phone.trim().is_empty() {
            return Err(MaternalError::Validation("电话不能为空".to_string()));
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(MaternalError::Validation(format!(
                "年龄 {} 超出 {}-{} 岁范围",
                self.age, MIN_AGE, MAX_AGE
            )));
        }
        Ok(())
    }
}

/// 患者登记处
pub struct PatientRegistry {
    patients: Arc<dyn PatientRepository>,
}

impl std::fmt::Debug for PatientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientRegistry").finish_non_exhaustive()
    }
}

impl PatientRegistry {
    pub fn new(patients: Arc<dyn PatientRepository>) -> Self {
        Self { patients }
    }

    pub async fn register(&self, request: NewPatient) -> Result<Patient> {
        request.validate()?;

        let patient = Patient {
            id: generate_record_id(PATIENT_ID_PREFIX),
            national_id: request.national_id,
            name: request.name.trim().to_string(),
            postname: request.postname,
            age: request.age,
            phone: request.phone.trim().to_string(),
            risk_level: request.risk_level,
            structure_id: request.structure_id,
            dob: request.dob,
            address: request.address,
            civil_status: request.civil_status,
            residence: request.residence,
            gestational_age: request.gestational_age,
            last_visit: None,
            evolution: Vec::new(),
            preventive_measures: PreventiveMeasures::default(),
            antecedents: request.antecedents,
            created_at: None,
            updated_at: None,
        };

        let saved = self.patients.save(patient).await?;
        tracing::info!("Registered patient {} ({:?} risk)", saved.id, saved.risk_level);
        Ok(saved)
    }

    pub async fn get(&self, id: &str) -> Result<Patient> {
        self.patients
            .get_by_id(id)
            .await?
            .ok_or_else(|| MaternalError::NotFound(format!("患者 {} 不存在", id)))
    }

    pub async fn list(&self) -> Result<Vec<Patient>> {
        self.patients.get_all().await
    }

    /// 按姓名（不区分大小写）或电话检索
    pub async fn search(&self, query: &str) -> Result<Vec<Patient>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }
        let needle = query.to_lowercase();

        Ok(self
            .patients
            .get_all()
            .await?
            .into_iter()
            .filter(|p| p.full_name().to_lowercase().contains(&needle) || p.phone.contains(query))
            .collect())
    }

    /// 追加产前检查记录并更新最近就诊日期
    pub async fn record_visit(&self, id: &str, record: EvolutionRecord) -> Result<Patient> {
        let mut patient = self.get(id).await?;

        if record.weight <= 0.0 || !record.weight.is_finite() {
            return Err(MaternalError::Validation(format!("体重 {} 无效", record.weight)));
        }

        let visit_date = record.date;
        patient.last_visit = Some(patient.last_visit.map_or(visit_date, |d| d.max(visit_date)));
        patient.evolution.push(record);

        let saved = self.patients.save(patient).await?;
        tracing::info!("Recorded CPN visit for patient {} on {}", saved.id, visit_date);
        Ok(saved)
    }

    /// 记录一剂 VAT 接种
    pub async fn record_vat_dose(&self, id: &str, date: NaiveDate) -> Result<(Patient, VatDose)> {
        let mut patient = self.get(id).await?;
        let dose = vaccination::validate_next_dose(&patient.preventive_measures.vat_dates, date)?;

        patient.preventive_measures.vat_dates.push(date);
        let saved = self.patients.save(patient).await?;
        tracing::info!("Recorded {:?} for patient {} on {}", dose, saved.id, date);
        Ok((saved, dose))
    }

    pub async fn vaccination_schedule(&self, id: &str, today: NaiveDate) -> Result<Vec<DoseEntry>> {
        let patient = self.get(id).await?;
        vaccination::schedule(&patient.preventive_measures.vat_dates, today)
    }

    /// 人工调整风险等级
    pub async fn update_risk(&self, id: &str, risk_level: RiskLevel) -> Result<Patient> {
        let mut patient = self.get(id).await?;
        if patient.risk_level != risk_level {
            tracing::info!(
                "Patient {} risk level {:?} -> {:?}",
                patient.id,
                patient.risk_level,
                risk_level
            );
        }
        patient.risk_level = risk_level;
        self.patients.save(patient).await
    }
}
