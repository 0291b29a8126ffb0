//! 工作流引擎
//!
//! 组合患者登记、产程图、转诊与机构目录，并汇总登记统计

use crate::{
    directory::HealthDirectory,
    partograph::{PartographDesk, VitalThresholds},
    progress::{ProgressConfig, ProgressEvaluator, ProgressZone},
    referral::ReferralDesk,
    registry::PatientRegistry,
};
use maternal_core::{PartographStatus, ReferralPriority, ReferralStatus, Result, RiskLevel};
use maternal_storage::{PartographRepository, PatientRepository, ReferralRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 登记统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total_patients: usize,
    pub patients_by_risk: BTreeMap<RiskLevel, usize>,
    pub partographs_by_status: BTreeMap<PartographStatus, usize>,
    pub referrals_by_status: BTreeMap<ReferralStatus, usize>,
    pub referrals_by_priority: BTreeMap<ReferralPriority, usize>,
    /// 进行中且当前处于警戒区的产程图
    pub active_in_alert: usize,
    /// 进行中且当前已越过处理线的产程图
    pub active_in_action: usize,
}

fn zeroed<K: Ord + Copy>(keys: &[K]) -> BTreeMap<K, usize> {
    keys.iter().map(|&k| (k, 0)).collect()
}

/// 工作流引擎
pub struct WorkflowEngine {
    registry: PatientRegistry,
    partographs: PartographDesk,
    referrals: Arc<ReferralDesk>,
    directory: HealthDirectory,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("partographs", &self.partographs)
            .field("referrals", &self.referrals)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// 基于同一存储创建引擎
    pub fn new<S>(store: Arc<S>, progress: ProgressConfig, vitals: VitalThresholds) -> Result<Self>
    where
        S: PatientRepository + PartographRepository + ReferralRepository + 'static,
    {
        let evaluator = ProgressEvaluator::new(progress)?;
        let referrals = Arc::new(ReferralDesk::new(store.clone()));

        Ok(Self {
            registry: PatientRegistry::new(store.clone()),
            partographs: PartographDesk::new(store, referrals.clone(), evaluator, vitals),
            referrals,
            directory: HealthDirectory::north_kivu(),
        })
    }

    pub fn with_defaults<S>(store: Arc<S>) -> Self
    where
        S: PatientRepository + PartographRepository + ReferralRepository + 'static,
    {
        let evaluator = ProgressEvaluator::default();
        let referrals = Arc::new(ReferralDesk::new(store.clone()));

        Self {
            registry: PatientRegistry::new(store.clone()),
            partographs: PartographDesk::new(store, referrals.clone(), evaluator, VitalThresholds::default()),
            referrals,
            directory: HealthDirectory::north_kivu(),
        }
    }

    pub fn with_directory(mut self, directory: HealthDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn registry(&self) -> &PatientRegistry {
        &self.registry
    }

    pub fn partographs(&self) -> &PartographDesk {
        &self.partographs
    }

    pub fn referrals(&self) -> &ReferralDesk {
        &self.referrals
    }

    pub fn directory(&self) -> &HealthDirectory {
        &self.directory
    }

    /// 汇总登记统计
    pub async fn statistics(&self) -> Result<RegistryStatistics> {
        let mut stats = RegistryStatistics {
            patients_by_risk: zeroed(&[RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]),
            partographs_by_status: zeroed(&[
                PartographStatus::Active,
                PartographStatus::Closed,
                PartographStatus::Referred,
            ]),
            referrals_by_status: zeroed(&[
                ReferralStatus::Pending,
                ReferralStatus::InTransit,
                ReferralStatus::Received,
                ReferralStatus::Completed,
            ]),
            referrals_by_priority: zeroed(&[
                ReferralPriority::Routine,
                ReferralPriority::Emergency,
                ReferralPriority::Vital,
            ]),
            ..Default::default()
        };

        let patients = self.registry.list().await?;
        stats.total_patients = patients.len();
        for patient in &patients {
            *stats.patients_by_risk.entry(patient.risk_level).or_default() += 1;
        }

        for partograph in self.partographs.all().await? {
            *stats.partographs_by_status.entry(partograph.status).or_default() += 1;
            if !partograph.is_active() {
                continue;
            }

            match self.partographs.assess_record(&partograph) {
                Ok(assessment) => match assessment.progress.latest_zone() {
                    Some(ProgressZone::Alert) => stats.active_in_alert += 1,
                    Some(ProgressZone::Action) => stats.active_in_action += 1,
                    _ => {}
                },
                Err(e) => {
                    tracing::warn!("Skipping partograph {} in statistics: {}", partograph.id, e);
                }
            }
        }

        for referral in self.referrals.list().await? {
            *stats.referrals_by_status.entry(referral.status).or_default() += 1;
            *stats.referrals_by_priority.entry(referral.priority).or_default() += 1;
        }

        tracing::debug!("Computed registry statistics: {:?}", stats);
        Ok(stats)
    }
}
