//! 产程图管理
//!
//! 开立产程图、录入观察、评估进展、分娩关闭或转出

use crate::progress::{ProgressConfig, ProgressEvaluator, ProgressPoint, ProgressReport, ProgressZone};
use crate::referral::{validate_request, ReferralDesk};
use crate::state_machine::{PartographEvent, PartographStateMachine};
use chrono::{DateTime, SubsecRound, Utc};
use maternal_core::utils::{
    generate_record_id, hours_between, OBSERVATION_ID_PREFIX, PARTOGRAPH_ID_PREFIX,
};
use maternal_core::{
    BloodPressure, DeliveryOutcome, InitialExam, Liquor, MaternalError, NewReferral, Partograph,
    PartographObservation, PartographStatus, Referral, ReferralPriority, Result,
};
use maternal_storage::PartographRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 生命体征复核阈值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalThresholds {
    pub fetal_heart_rate_min: u16,
    pub fetal_heart_rate_max: u16,
    pub maternal_pulse_max: u16,
    pub fever_temperature: f64,
    pub systolic_max: u16,
    pub diastolic_max: u16,
    pub contractions_max: u8,
}

impl Default for VitalThresholds {
    fn default() -> Self {
        Self {
            fetal_heart_rate_min: 110,
            fetal_heart_rate_max: 160,
            maternal_pulse_max: 120,
            fever_temperature: 38.0,
            systolic_max: 140,
            diastolic_max: 90,
            contractions_max: 5,
        }
    }
}

/// 生命体征异常
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VitalFlag {
    FetalBradycardia(u16),
    FetalTachycardia(u16),
    MaternalTachycardia(u16),
    Fever(f64),
    Hypertension(BloodPressure),
    Hyperstimulation(u8),
    StainedLiquor(Liquor),
}

impl VitalThresholds {
    /// 检查单次观察的生命体征
    pub fn check(&self, observation: &PartographObservation) -> Vec<VitalFlag> {
        let mut flags = Vec::new();

        if observation.fetal_heart_rate < self.fetal_heart_rate_min {
            flags.push(VitalFlag::FetalBradycardia(observation.fetal_heart_rate));
        } else if observation.fetal_heart_rate > self.fetal_heart_rate_max {
            flags.push(VitalFlag::FetalTachycardia(observation.fetal_heart_rate));
        }
        if observation.maternal_pulse > self.maternal_pulse_max {
            flags.push(VitalFlag::MaternalTachycardia(observation.maternal_pulse));
        }
        if observation.temperature >= self.fever_temperature {
            flags.push(VitalFlag::Fever(observation.temperature));
        }
        let bp = observation.blood_pressure;
        if bp.systolic() >= self.systolic_max || bp.diastolic() >= self.diastolic_max {
            flags.push(VitalFlag::Hypertension(bp));
        }
        if observation.contractions > self.contractions_max {
            flags.push(VitalFlag::Hyperstimulation(observation.contractions));
        }
        if matches!(observation.liquor, Liquor::Meconium | Liquor::Blood) {
            flags.push(VitalFlag::StainedLiquor(observation.liquor));
        }

        flags
    }
}

/// 观察录入请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationInput {
    pub time: DateTime<Utc>,
    pub cervical_dilatation: f64,
    pub fetal_heart_rate: u16,
    pub contractions: u8,
    pub blood_pressure: BloodPressure,
    pub maternal_pulse: u16,
    pub temperature: f64,
    pub liquor: Liquor,
    pub moulding: u8,
}

/// 产程图评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartographAssessment {
    pub partograph_id: String,
    pub progress: ProgressReport,
    /// (观察序号, 异常)
    pub vital_flags: Vec<(usize, VitalFlag)>,
}

impl PartographAssessment {
    pub fn worst_zone(&self) -> Option<ProgressZone> {
        self.progress.worst_zone()
    }

    pub fn needs_review(&self) -> bool {
        self.progress.needs_review() || !self.vital_flags.is_empty()
    }
}

/// 将观察换算为自活跃期起点计时的评估点
///
/// 活跃期起点为第一次扩张达到起始值的观察时间；尚未进入活跃期时以首次观察计时。
pub fn progress_points(partograph: &Partograph, config: &ProgressConfig) -> Vec<ProgressPoint> {
    let origin = partograph
        .observations
        .iter()
        .find(|o| o.cervical_dilatation >= config.active_phase_start_cm)
        .or_else(|| partograph.observations.first())
        .map(|o| o.time);

    match origin {
        Some(origin) => partograph
            .observations
            .iter()
            .map(|o| ProgressPoint::new(hours_between(origin, o.time), o.cervical_dilatation))
            .collect(),
        None => Vec::new(),
    }
}

/// 转出请求
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from_structure_id: String,
    pub to_structure_id: String,
    pub reason: String,
    /// 未指定时按评估结果决定
    pub priority: Option<ReferralPriority>,
}

/// 产程图台
pub struct PartographDesk {
    partographs: Arc<dyn PartographRepository>,
    referrals: Arc<ReferralDesk>,
    evaluator: ProgressEvaluator,
    vitals: VitalThresholds,
    state_machine: PartographStateMachine,
}

impl std::fmt::Debug for PartographDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartographDesk")
            .field("evaluator", &self.evaluator)
            .field("vitals", &self.vitals)
            .finish()
    }
}

impl PartographDesk {
    pub fn new(
        partographs: Arc<dyn PartographRepository>,
        referrals: Arc<ReferralDesk>,
        evaluator: ProgressEvaluator,
        vitals: VitalThresholds,
    ) -> Self {
        Self {
            partographs,
            referrals,
            evaluator,
            vitals,
            state_machine: PartographStateMachine::new(),
        }
    }

    /// 入院开立产程图；同一患者只能有一份进行中的产程图
    ///
    /// 开始时间与观察时间一样按毫秒截断。
    pub async fn open(
        &self,
        patient_id: &str,
        user_id: &str,
        start_time: DateTime<Utc>,
        initial_exam: InitialExam,
    ) -> Result<Partograph> {
        if patient_id.trim().is_empty() {
            return Err(MaternalError::Validation("产程图必须关联患者".to_string()));
        }

        let active = self.partographs.get_active().await?;
        if let Some(existing) = active.iter().find(|p| p.patient_id == patient_id) {
            return Err(MaternalError::Workflow(format!(
                "患者 {} 已有进行中的产程图 {}",
                patient_id, existing.id
            )));
        }

        let partograph = Partograph {
            id: generate_record_id(PARTOGRAPH_ID_PREFIX),
            patient_id: patient_id.to_string(),
            user_id: user_id.to_string(),
            start_time: start_time.trunc_subsecs(3),
            status: PartographStatus::Active,
            initial_exam,
            observations: Vec::new(),
            outcome: None,
            created_at: None,
            updated_at: None,
        };

        let saved = self.partographs.save(partograph).await?;
        tracing::info!("Opened partograph {} for patient {}", saved.id, patient_id);
        Ok(saved)
    }

    pub async fn get(&self, id: &str) -> Result<Partograph> {
        self.partographs
            .get_by_id(id)
            .await?
            .ok_or_else(|| MaternalError::NotFound(format!("产程图 {} 不存在", id)))
    }

    pub async fn active(&self) -> Result<Vec<Partograph>> {
        self.partographs.get_active().await
    }

    pub async fn all(&self) -> Result<Vec<Partograph>> {
        self.partographs.get_all().await
    }

    /// 录入观察；观察时间按毫秒截断后保存
    pub async fn record_observation(
        &self,
        id: &str,
        mut input: ObservationInput,
    ) -> Result<PartographObservation> {
        input.time = input.time.trunc_subsecs(3);
        let mut partograph = self.get(id).await?;
        if !partograph.is_active() {
            return Err(MaternalError::Workflow(format!(
                "产程图 {} 状态为 {:?}，不能录入观察",
                id, partograph.status
            )));
        }

        self.validate_observation(&partograph, &input)?;

        let observation = PartographObservation {
            id: generate_record_id(OBSERVATION_ID_PREFIX),
            partograph_id: partograph.id.clone(),
            time: input.time,
            cervical_dilatation: input.cervical_dilatation,
            fetal_heart_rate: input.fetal_heart_rate,
            contractions: input.contractions,
            blood_pressure: input.blood_pressure,
            maternal_pulse: input.maternal_pulse,
            temperature: input.temperature,
            liquor: input.liquor,
            moulding: input.moulding,
        };
        partograph.observations.push(observation.clone());

        let partograph = self.partographs.save(partograph).await?;
        tracing::info!(
            "Recorded observation {} on partograph {}: {:.1} cm",
            observation.id,
            partograph.id,
            observation.cervical_dilatation
        );

        for flag in self.vitals.check(&observation) {
            tracing::warn!("Partograph {} vital sign flag: {:?}", partograph.id, flag);
        }

        Ok(observation)
    }

    fn validate_observation(&self, partograph: &Partograph, input: &ObservationInput) -> Result<()> {
        let full = self.evaluator.config().full_dilation_cm;
        if !input.cervical_dilatation.is_finite()
            || input.cervical_dilatation < 0.0
            || input.cervical_dilatation > full
        {
            return Err(MaternalError::Validation(format!(
                "宫口扩张 {} cm 超出 0-{} cm 范围",
                input.cervical_dilatation, full
            )));
        }
        if !input.temperature.is_finite() || !(30.0..=45.0).contains(&input.temperature) {
            return Err(MaternalError::Validation(format!("体温 {} 无效", input.temperature)));
        }
        if input.moulding > 3 {
            return Err(MaternalError::Validation(format!("胎头塑形 {} 超出 0-3", input.moulding)));
        }
        if input.time < partograph.start_time {
            return Err(MaternalError::Validation("观察时间早于产程图开始时间".to_string()));
        }

        if let Some(last) = partograph.latest_observation() {
            if input.time <= last.time {
                return Err(MaternalError::Validation(format!(
                    "观察时间必须晚于上一次观察 {}",
                    last.time
                )));
            }
            if input.cervical_dilatation < last.cervical_dilatation {
                return Err(MaternalError::Validation(format!(
                    "宫口扩张不能回退: {} cm -> {} cm",
                    last.cervical_dilatation, input.cervical_dilatation
                )));
            }
        }

        Ok(())
    }

    /// 评估产程进展与生命体征
    pub async fn assess(&self, id: &str) -> Result<PartographAssessment> {
        let partograph = self.get(id).await?;
        self.assess_record(&partograph)
    }

    pub fn assess_record(&self, partograph: &Partograph) -> Result<PartographAssessment> {
        let points = progress_points(partograph, self.evaluator.config());
        let progress = self.evaluator.evaluate(&points)?;

        let vital_flags = partograph
            .observations
            .iter()
            .enumerate()
            .flat_map(|(index, obs)| self.vitals.check(obs).into_iter().map(move |flag| (index, flag)))
            .collect();

        Ok(PartographAssessment {
            partograph_id: partograph.id.clone(),
            progress,
            vital_flags,
        })
    }

    /// 分娩完成，关闭产程图
    pub async fn close(&self, id: &str, outcome: DeliveryOutcome) -> Result<Partograph> {
        let mut partograph = self.get(id).await?;

        if outcome.apgar1 > 10 || outcome.apgar5 > 10 {
            return Err(MaternalError::Validation("Apgar评分必须在0-10之间".to_string()));
        }
        if outcome.baby_weight == 0 {
            return Err(MaternalError::Validation("新生儿体重必须大于0".to_string()));
        }
        if outcome.delivery_time < partograph.start_time {
            return Err(MaternalError::Validation("分娩时间早于产程图开始时间".to_string()));
        }

        partograph.status = self
            .state_machine
            .transition(partograph.status, PartographEvent::Deliver)?;
        partograph.outcome = Some(outcome);

        let closed = self.partographs.save(partograph).await?;
        tracing::info!("Closed partograph {} after delivery", closed.id);
        Ok(closed)
    }

    /// 转出：创建转诊并将产程图置为已转诊
    ///
    /// 未指定优先级时，已越过处理线为急诊，否则为常规。
    pub async fn refer(&self, id: &str, request: TransferRequest) -> Result<(Partograph, Referral)> {
        let mut partograph = self.get(id).await?;
        let next_status = self
            .state_machine
            .transition(partograph.status, PartographEvent::Refer)?;

        let priority = match request.priority {
            Some(priority) => priority,
            None => match self.assess_record(&partograph)?.worst_zone() {
                Some(ProgressZone::Action) => ReferralPriority::Emergency,
                _ => ReferralPriority::Routine,
            },
        };

        let new_referral = NewReferral {
            patient_id: partograph.patient_id.clone(),
            from_structure_id: request.from_structure_id,
            to_structure_id: request.to_structure_id,
            priority,
            reason: request.reason,
        };
        validate_request(&new_referral)?;

        // 产程图先置为 REFERRED 落盘，之后才写入转诊
        partograph.status = next_status;
        let referred = self.partographs.save(partograph).await?;

        let referral = match self.referrals.create(new_referral).await {
            Ok(referral) => referral,
            Err(e) => {
                tracing::error!(
                    "Partograph {} marked referred but referral creation failed: {}",
                    referred.id,
                    e
                );
                return Err(e);
            }
        };
        tracing::info!("Partograph {} referred out under {}", referred.id, referral.id);
        Ok((referred, referral))
    }

    pub fn evaluator(&self) -> &ProgressEvaluator {
        &self.evaluator
    }
}
