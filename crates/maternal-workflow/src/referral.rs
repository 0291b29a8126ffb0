//! 转诊处理
//!
//! 创建机构间转诊并按固定顺序推进状态

use crate::state_machine::{ReferralEvent, ReferralStateMachine};
use maternal_core::{MaternalError, NewReferral, Referral, ReferralStatus, Result};
use maternal_storage::ReferralRepository;
use std::sync::Arc;

/// 转诊台
pub struct ReferralDesk {
    referrals: Arc<dyn ReferralRepository>,
    state_machine: ReferralStateMachine,
}

impl std::fmt::Debug for ReferralDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferralDesk")
            .field("state_machine", &self.state_machine)
            .finish()
    }
}

impl ReferralDesk {
    pub fn new(referrals: Arc<dyn ReferralRepository>) -> Self {
        Self {
            referrals,
            state_machine: ReferralStateMachine::new(),
        }
    }

    /// 创建转诊
    pub async fn create(&self, request: NewReferral) -> Result<Referral> {
        validate_request(&request)?;

        let id = self.referrals.create(request).await?;
        let referral = self.get(&id).await?;

        tracing::warn!(
            "Referral {} for patient {} sent from {} to {} with priority {:?}",
            referral.id,
            referral.patient_id,
            referral.from_structure_id,
            referral.to_structure_id,
            referral.priority
        );
        Ok(referral)
    }

    pub async fn get(&self, id: &str) -> Result<Referral> {
        self.referrals
            .get_by_id(id)
            .await?
            .ok_or_else(|| MaternalError::NotFound(format!("转诊 {} 不存在", id)))
    }

    pub async fn list(&self) -> Result<Vec<Referral>> {
        self.referrals.get_all().await
    }

    pub async fn list_by_status(&self, status: ReferralStatus) -> Result<Vec<Referral>> {
        Ok(self
            .referrals
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    /// 应用状态事件；事件必须与当前状态的下一步一致
    pub async fn apply(&self, id: &str, event: ReferralEvent) -> Result<Referral> {
        let current = self.get(id).await?;
        let expected = self.state_machine.transition(current.status, event)?;

        let updated = self.referrals.advance_status(id).await?;
        if updated.status != expected {
            return Err(MaternalError::Internal(format!(
                "转诊 {} 状态推进不一致: 期望 {:?}, 实际 {:?}",
                id, expected, updated.status
            )));
        }
        Ok(updated)
    }

    /// 推进到下一状态
    pub async fn advance(&self, id: &str) -> Result<Referral> {
        let current = self.get(id).await?;
        let event = self.state_machine.forward_event(current.status).ok_or_else(|| {
            MaternalError::InvalidStateTransition {
                from: format!("{:?}", current.status),
                event: "Advance".to_string(),
            }
        })?;
        self.apply(id, event).await
    }

    pub fn state_machine(&self) -> &ReferralStateMachine {
        &self.state_machine
    }
}

/// 校验转诊请求的患者、机构与原因
pub fn validate_request(request: &NewReferral) -> Result<()> {
    if request.patient_id.trim().is_empty() {
        return Err(MaternalError::Validation("转诊必须指定患者".to_string()));
    }
    if request.from_structure_id.trim().is_empty() || request.to_structure_id.trim().is_empty() {
        return Err(MaternalError::Validation("转诊必须指定转出与接收机构".to_string()));
    }
    if request.from_structure_id == request.to_structure_id {
        return Err(MaternalError::Validation("转出机构与接收机构不能相同".to_string()));
    }
    if request.reason.trim().is_empty() {
        return Err(MaternalError::Validation("转诊原因不能为空".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maternal_core::ReferralPriority;
    use maternal_storage::LocalStore;

    fn desk() -> ReferralDesk {
        ReferralDesk::new(Arc::new(LocalStore::in_memory()))
    }

    fn request() -> NewReferral {
        NewReferral {
            patient_id: "PAT-1".to_string(),
            from_structure_id: "RUSAYO".to_string(),
            to_structure_id: "HGR-NYI".to_string(),
            priority: ReferralPriority::Vital,
            reason: "Hémorragie".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_validates_request() {
        let desk = desk();

        let same_structure = NewReferral {
            to_structure_id: "RUSAYO".to_string(),
            ..request()
        };
        assert!(matches!(desk.create(same_structure).await, Err(MaternalError::Validation(_))));

        let no_reason = NewReferral {
            reason: "  ".to_string(),
            ..request()
        };
        assert!(desk.create(no_reason).await.is_err());

        let referral = desk.create(request()).await.unwrap();
        assert_eq!(referral.status, ReferralStatus::Pending);
        assert_eq!(desk.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_rejects_out_of_order_events() {
        let desk = desk();
        let referral = desk.create(request()).await.unwrap();

        assert!(matches!(
            desk.apply(&referral.id, ReferralEvent::Arrive).await,
            Err(MaternalError::InvalidStateTransition { .. })
        ));
        assert_eq!(desk.get(&referral.id).await.unwrap().status, ReferralStatus::Pending);

        let dispatched = desk.apply(&referral.id, ReferralEvent::Dispatch).await.unwrap();
        assert_eq!(dispatched.status, ReferralStatus::InTransit);
    }

    #[tokio::test]
    async fn test_advance_to_completion() {
        let desk = desk();
        let referral = desk.create(request()).await.unwrap();

        for expected in [ReferralStatus::InTransit, ReferralStatus::Received, ReferralStatus::Completed] {
            assert_eq!(desk.advance(&referral.id).await.unwrap().status, expected);
        }
        assert!(desk.advance(&referral.id).await.is_err());

        let completed = desk.list_by_status(ReferralStatus::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
    }
}
