//! 核心数据模型定义
//!
//! 持久化格式沿用前端的 JSON 文档：字段为 camelCase，枚举值为大写下划线。

use crate::error::MaternalError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// 行政层级与用户
// ---------------------------------------------------------------------------

/// 访问入口角色（卫生金字塔层级）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    ComfortAsbl, // 合作机构
    Dps,         // 省卫生局
    ZoneDeSante, // 卫生区 / HGR
    AireDeSante, // 卫生片区 / 卫生中心
    Communaute,  // 社区孕妇
}

/// 岗位角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRole {
    Admin,     // 管理员
    Medecin,   // 医生
    Infirmier, // 护士
    SageFemme, // 助产士
}

/// 省
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Province {
    pub id: String,
    pub name: String,
}

/// 卫生区
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDeSante {
    pub id: String,
    pub name: String,
    pub province_id: String,
    pub hgr_id: String,
    pub hgr_name: Option<String>,
}

/// 医疗机构类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructureType {
    Hgr, // 总医院
    Cs,  // 卫生中心
}

/// 医疗机构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStructure {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub structure_type: StructureType,
    pub zone_id: String,
    pub province_id: String,
}

// ---------------------------------------------------------------------------
// 患者档案
// ---------------------------------------------------------------------------

/// 风险等级（人工评定）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// 居住地类别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResidenceCategory {
    As,  // 本片区
    Has, // 片区外
    Hz,  // 卫生区外
}

/// 血压读数，持久化为 "120/80" 字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BloodPressure {
    systolic: u16,
    diastolic: u16,
}

impl BloodPressure {
    /// 舒张压必须低于收缩压
    pub fn new(systolic: u16, diastolic: u16) -> Result<Self, MaternalError> {
        if systolic == 0 || diastolic >= systolic {
            return Err(MaternalError::Validation(format!(
                "血压读数无效: {}/{}",
                systolic, diastolic
            )));
        }
        Ok(Self { systolic, diastolic })
    }

    pub fn systolic(&self) -> u16 {
        self.systolic
    }

    pub fn diastolic(&self) -> u16 {
        self.diastolic
    }
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl FromStr for BloodPressure {
    type Err = MaternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sys, dia) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| MaternalError::Validation(format!("血压格式无效: {}", s)))?;

        let systolic: u16 = sys
            .trim()
            .parse()
            .map_err(|_| MaternalError::Validation(format!("收缩压无效: {}", s)))?;
        let diastolic: u16 = dia
            .trim()
            .parse()
            .map_err(|_| MaternalError::Validation(format!("舒张压无效: {}", s)))?;

        Self::new(systolic, diastolic)
    }
}

impl TryFrom<String> for BloodPressure {
    type Error = MaternalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BloodPressure> for String {
    fn from(bp: BloodPressure) -> Self {
        bp.to_string()
    }
}

/// 产前检查记录（每次 CPN 一行，只追加）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionRecord {
    pub date: NaiveDate,
    pub months_weeks: String,
    pub weight: f64,
    pub bp: BloodPressure,
    pub fetal_movements: bool,
    pub fetal_heart_rate: u16,
    pub presentation: String,
    pub edema: bool,
    pub albuminuria: String,
    pub glucosuria: String,
}

/// 内科既往史代码
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MedicalAntecedent {
    Tb,  // 结核
    Hta, // 高血压
    Sca, // 镰状细胞贫血
    Dbt, // 糖尿病
    Car, // 心脏病
    Hmo, // 出血性疾病
    Mgf, // 女性生殖器切割
    Ra,  // 风湿
}

/// 产科既往史
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObstetricalHistory {
    pub parity: u32,
    pub gravidity: u32,
    pub living_children: u32,
    pub abortions: u32,
    pub c_section: bool,
    pub dystocia: bool,
    pub cerclage: bool,
    pub vacuum: bool,
    pub fractured_pelvis: bool,
    pub eutocia: bool,
}

/// 既往史
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Antecedents {
    pub medical: Vec<MedicalAntecedent>,
    pub surgical: String,
    pub obstetrical: ObstetricalHistory,
}

/// 预防措施
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreventiveMeasures {
    pub vat_dates: Vec<NaiveDate>, // 破伤风疫苗接种日期
    pub sp_dates: Vec<NaiveDate>,  // 磺胺多辛-乙胺嘧啶预防用药日期
    pub iron_folic: bool,
    pub mebendazole: bool,
    pub itn: bool, // 驱虫蚊帐
}

/// 患者档案
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub national_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub postname: Option<String>,
    pub age: u8,
    pub phone: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub structure_id: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub civil_status: Option<String>,
    #[serde(default)]
    pub residence: Option<ResidenceCategory>,
    #[serde(default)]
    pub gestational_age: Option<u8>, // 孕周
    #[serde(default)]
    pub last_visit: Option<NaiveDate>,
    #[serde(default)]
    pub evolution: Vec<EvolutionRecord>,
    #[serde(default)]
    pub preventive_measures: PreventiveMeasures,
    #[serde(default)]
    pub antecedents: Option<Antecedents>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// 全名（姓名 + 父名）
    pub fn full_name(&self) -> String {
        match &self.postname {
            Some(postname) if !postname.is_empty() => format!("{} {}", self.name, postname),
            _ => self.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// 产程图
// ---------------------------------------------------------------------------

/// 羊水性状
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Liquor {
    #[serde(rename = "C")]
    Clear, // 清
    #[serde(rename = "M")]
    Meconium, // 胎粪污染
    #[serde(rename = "B")]
    Blood, // 血性
    #[serde(rename = "I")]
    Intact, // 胎膜未破
}

/// 产程观察记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartographObservation {
    pub id: String,
    pub partograph_id: String,
    pub time: DateTime<Utc>,
    pub cervical_dilatation: f64, // 宫口扩张 0-10 cm
    pub fetal_heart_rate: u16,
    pub contractions: u8, // 每10分钟宫缩次数
    pub blood_pressure: BloodPressure,
    pub maternal_pulse: u16,
    pub temperature: f64,
    pub liquor: Liquor,
    pub moulding: u8, // 胎头塑形 0-3
}

/// 产程图状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartographStatus {
    Active,   // 产程中
    Closed,   // 已分娩
    Referred, // 已转诊
}

/// 入院初检
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InitialExam {
    pub presentation: String,
    pub position: String,
    pub station: i8,
}

/// 分娩方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMode {
    Eutocic,      // 顺产
    CSection,     // 剖宫产
    Instrumental, // 器械助产
}

/// 新生儿性别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// 分娩结局
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub delivery_time: DateTime<Utc>,
    pub mode: DeliveryMode,
    pub apgar1: u8,
    pub apgar5: u8,
    pub baby_weight: u32, // 克
    pub gender: Gender,
}

/// 产程图（每次分娩一份）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Partograph {
    pub id: String,
    pub patient_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub status: PartographStatus,
    pub initial_exam: InitialExam,
    #[serde(default)]
    pub observations: Vec<PartographObservation>,
    #[serde(default)]
    pub outcome: Option<DeliveryOutcome>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Partograph {
    pub fn is_active(&self) -> bool {
        self.status == PartographStatus::Active
    }

    pub fn latest_observation(&self) -> Option<&PartographObservation> {
        self.observations.last()
    }
}

// ---------------------------------------------------------------------------
// 转诊
// ---------------------------------------------------------------------------

/// 转诊优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralPriority {
    Routine,   // 常规
    Emergency, // 急诊
    Vital,     // 危及生命
}

/// 转诊状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    Pending,   // 待出发
    InTransit, // 转运中
    Received,  // 已接收
    Completed, // 已完成
}

impl ReferralStatus {
    /// 下一个状态；转诊只能向前推进
    pub fn next(self) -> Option<ReferralStatus> {
        match self {
            ReferralStatus::Pending => Some(ReferralStatus::InTransit),
            ReferralStatus::InTransit => Some(ReferralStatus::Received),
            ReferralStatus::Received => Some(ReferralStatus::Completed),
            ReferralStatus::Completed => None,
        }
    }
}

/// 转诊记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: String,
    pub patient_id: String,
    pub from_structure_id: String,
    pub to_structure_id: String,
    pub priority: ReferralPriority,
    pub reason: String,
    pub status: ReferralStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 新建转诊请求（编号与时间戳由存储分配）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewReferral {
    pub patient_id: String,
    pub from_structure_id: String,
    pub to_structure_id: String,
    pub priority: ReferralPriority,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_pressure_parse() {
        let bp: BloodPressure = "120/80".parse().unwrap();
        assert_eq!(bp, BloodPressure::new(120, 80).unwrap());
        assert_eq!(bp.to_string(), "120/80");

        assert!("120".parse::<BloodPressure>().is_err());
        assert!("abc/80".parse::<BloodPressure>().is_err());
        assert!("80/120".parse::<BloodPressure>().is_err());
    }

    #[test]
    fn test_blood_pressure_constructor_matches_parser() {
        assert!(BloodPressure::new(90, 90).is_err());
        assert!(BloodPressure::new(80, 120).is_err());
        assert!(BloodPressure::new(0, 0).is_err());

        let bp = BloodPressure::new(140, 95).unwrap();
        let json = serde_json::to_string(&bp).unwrap();
        assert_eq!(json, "\"140/95\"");
        let back: BloodPressure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bp);
    }

    #[test]
    fn test_patient_json_shape() {
        let json = r#"{
            "id": "PAT-1",
            "name": "Kavira",
            "age": 24,
            "phone": "0991234567",
            "riskLevel": "HIGH",
            "evolution": [{
                "date": "2024-03-12",
                "monthsWeeks": "6M/26S",
                "weight": 61.5,
                "bp": "110/70",
                "fetalMovements": true,
                "fetalHeartRate": 142,
                "presentation": "Céphalique",
                "edema": false,
                "albuminuria": "-",
                "glucosuria": "-"
            }],
            "antecedents": { "medical": ["HTA", "SCA"], "obstetrical": { "parity": 2, "cSection": true } }
        }"#;

        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.risk_level, RiskLevel::High);
        assert_eq!(patient.evolution[0].bp, BloodPressure::new(110, 70).unwrap());
        let antecedents = patient.antecedents.as_ref().unwrap();
        assert_eq!(antecedents.medical, vec![MedicalAntecedent::Hta, MedicalAntecedent::Sca]);
        assert!(antecedents.obstetrical.c_section);
        assert!(patient.preventive_measures.vat_dates.is_empty());

        let value = serde_json::to_value(&patient).unwrap();
        assert_eq!(value["riskLevel"], "HIGH");
        assert_eq!(value["evolution"][0]["bp"], "110/70");
    }

    #[test]
    fn test_enum_wire_values() {
        assert_eq!(serde_json::to_string(&ReferralStatus::InTransit).unwrap(), "\"IN_TRANSIT\"");
        assert_eq!(serde_json::to_string(&DeliveryMode::CSection).unwrap(), "\"C_SECTION\"");
        assert_eq!(serde_json::to_string(&Liquor::Meconium).unwrap(), "\"M\"");
        assert_eq!(serde_json::to_string(&Role::ZoneDeSante).unwrap(), "\"ZONE_DE_SANTE\"");
        assert_eq!(serde_json::to_string(&ResidenceCategory::Has).unwrap(), "\"HAS\"");
    }
}
