//! 会话上下文
//!
//! 入口角色选择、登录、岗位选择与功能区访问控制

use maternal_core::{
    HealthStructure, JobRole, MaternalError, Province, Result, Role, StructureType, ZoneDeSante,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 功能区
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Section {
    Home,
    AfyaBot,
    Cpn,
    Partogram,
    Referrals,
    Stats,
    Vaccination,
}

impl Section {
    pub fn path(&self) -> &'static str {
        match self {
            Section::Home => "/",
            Section::AfyaBot => "/afyabot",
            Section::Cpn => "/cpn",
            Section::Partogram => "/partogram",
            Section::Referrals => "/referrals",
            Section::Stats => "/stats",
            Section::Vaccination => "/vaccination",
        }
    }
}

/// 入口角色及其所属层级
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSelection {
    pub role: Role,
    pub province: Option<Province>,
    pub zone: Option<ZoneDeSante>,
    pub structure: Option<HealthStructure>,
}

impl RoleSelection {
    fn bare(role: Role) -> Self {
        Self {
            role,
            province: None,
            zone: None,
            structure: None,
        }
    }

    pub fn community() -> Self {
        Self::bare(Role::Communaute)
    }

    pub fn comfort() -> Self {
        Self::bare(Role::ComfortAsbl)
    }

    pub fn dps(province: Province) -> Self {
        Self {
            province: Some(province),
            ..Self::bare(Role::Dps)
        }
    }

    pub fn zone(zone: ZoneDeSante) -> Self {
        Self {
            zone: Some(zone),
            ..Self::bare(Role::ZoneDeSante)
        }
    }

    pub fn aire(zone: ZoneDeSante, structure: HealthStructure) -> Self {
        Self {
            zone: Some(zone),
            structure: Some(structure),
            ..Self::bare(Role::AireDeSante)
        }
    }

    /// 检查角色所需的层级信息是否齐全
    pub fn validate(&self) -> Result<()> {
        match self.role {
            Role::Dps if self.province.is_none() => {
                Err(MaternalError::Validation("省卫生局入口必须选择省".to_string()))
            }
            Role::ZoneDeSante if self.zone.is_none() => {
                Err(MaternalError::Validation("卫生区入口必须选择卫生区".to_string()))
            }
            Role::AireDeSante => match (&self.zone, &self.structure) {
                (Some(zone), Some(structure)) => {
                    if structure.structure_type != StructureType::Cs || structure.zone_id != zone.id {
                        return Err(MaternalError::Validation(format!(
                            "卫生中心 {} 不属于卫生区 {}",
                            structure.id, zone.id
                        )));
                    }
                    Ok(())
                }
                _ => Err(MaternalError::Validation(
                    "卫生片区入口必须选择卫生区和卫生中心".to_string(),
                )),
            },
            _ => Ok(()),
        }
    }
}

/// 凭据校验
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, selection: &RoleSelection, user_id: &str, secret: &str) -> Result<bool>;
}

/// 固定账号列表
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    user_ids: HashSet<String>,
    secret: String,
}

impl StaticCredentials {
    pub fn new<I, S>(user_ids: I, secret: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: user_ids.into_iter().map(Into::into).collect(),
            secret: secret.into(),
        }
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, _selection: &RoleSelection, user_id: &str, secret: &str) -> Result<bool> {
        Ok(self.user_ids.contains(user_id) && self.secret == secret)
    }
}

/// 用户会话
#[derive(Debug, Clone, Default)]
pub struct Session {
    selection: Option<RoleSelection>,
    user_id: Option<String>,
    job_role: Option<JobRole>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_role(&mut self, selection: RoleSelection) -> Result<()> {
        if self.is_authenticated() {
            return Err(MaternalError::Workflow("已登录，请先退出再切换入口".to_string()));
        }
        selection.validate()?;
        tracing::debug!("Role selected: {:?}", selection.role);
        self.selection = Some(selection);
        Ok(())
    }

    /// 登录前返回入口选择
    pub fn back(&mut self) {
        if !self.is_authenticated() {
            self.selection = None;
        }
    }

    pub fn login(&mut self, verifier: &dyn CredentialVerifier, user_id: &str, secret: &str) -> Result<()> {
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| MaternalError::Workflow("请先选择入口角色".to_string()))?;

        if !verifier.verify(selection, user_id, secret)? {
            tracing::warn!("Failed login attempt for {} as {:?}", user_id, selection.role);
            return Err(MaternalError::Authentication("账号或密码错误".to_string()));
        }

        tracing::info!("User {} logged in as {:?}", user_id, selection.role);
        self.user_id = Some(user_id.to_string());
        self.job_role = None;
        Ok(())
    }

    /// 卫生区与卫生片区用户必须选择岗位
    pub fn requires_job_role(&self) -> bool {
        matches!(
            self.role(),
            Some(Role::ZoneDeSante) | Some(Role::AireDeSante)
        )
    }

    pub fn select_job_role(&mut self, job_role: JobRole) -> Result<()> {
        if !self.is_authenticated() {
            return Err(MaternalError::Workflow("请先登录".to_string()));
        }
        if !self.requires_job_role() {
            return Err(MaternalError::Workflow(format!(
                "入口 {:?} 不需要选择岗位",
                self.role()
            )));
        }
        self.job_role = Some(job_role);
        Ok(())
    }

    /// 清除登录与岗位，保留入口选择
    pub fn logout(&mut self) {
        if let Some(user_id) = self.user_id.take() {
            tracing::info!("User {} logged out", user_id);
        }
        self.job_role = None;
    }

    /// 清除全部会话状态
    pub fn quit(&mut self) {
        self.logout();
        self.selection = None;
    }

    pub fn role(&self) -> Option<Role> {
        self.selection.as_ref().map(|s| s.role)
    }

    pub fn selection(&self) -> Option<&RoleSelection> {
        self.selection.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn job_role(&self) -> Option<JobRole> {
        self.job_role
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// 已登录且已完成必需的岗位选择
    pub fn is_ready(&self) -> bool {
        self.is_authenticated() && (!self.requires_job_role() || self.job_role.is_some())
    }

    /// 当前可访问的功能区
    pub fn sections(&self) -> Vec<Section> {
        let role = match self.role() {
            Some(role) if self.is_ready() => role,
            _ => return Vec::new(),
        };

        let mut sections = vec![Section::Home, Section::AfyaBot];
        match role {
            Role::Communaute => sections.push(Section::Vaccination),
            Role::ZoneDeSante | Role::AireDeSante => {
                let job = self.job_role;
                let medical = matches!(job, Some(JobRole::Medecin) | Some(JobRole::SageFemme));
                let nursing = job == Some(JobRole::Infirmier);
                let admin = job == Some(JobRole::Admin);

                if medical || nursing {
                    sections.push(Section::Cpn);
                }
                if medical {
                    sections.push(Section::Partogram);
                }
                if admin || medical {
                    sections.push(Section::Referrals);
                }
            }
            Role::Dps | Role::ComfortAsbl => {
                sections.push(Section::Cpn);
                sections.push(Section::Stats);
            }
        }
        sections
    }

    pub fn can_access(&self, section: Section) -> bool {
        self.sections().contains(&section)
    }

    pub fn ensure_access(&self, section: Section) -> Result<()> {
        if self.can_access(section) {
            Ok(())
        } else {
            Err(MaternalError::Permission(format!("无权访问 {}", section.path())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::HealthDirectory;

    fn verifier() -> StaticCredentials {
        StaticCredentials::new(["0991234567", "0812345678"], "12345678")
    }

    fn aire_selection() -> RoleSelection {
        let dir = HealthDirectory::north_kivu();
        let zone = dir.zone("GOMA").unwrap().clone();
        let structure = dir.structure("HEAL").unwrap();
        RoleSelection::aire(zone, structure)
    }

    #[test]
    fn test_role_selection_requirements() {
        let mut session = Session::new();
        assert!(session.select_role(RoleSelection::bare(Role::Dps)).is_err());
        assert!(session.select_role(RoleSelection::bare(Role::ZoneDeSante)).is_err());

        let dir = HealthDirectory::north_kivu();
        let wrong_zone = RoleSelection::aire(
            dir.zone("KARISIMBI").unwrap().clone(),
            dir.structure("HEAL").unwrap(),
        );
        assert!(matches!(session.select_role(wrong_zone), Err(MaternalError::Validation(_))));

        session.select_role(aire_selection()).unwrap();
        assert_eq!(session.role(), Some(Role::AireDeSante));
    }

    #[test]
    fn test_login_requires_selection_and_valid_credentials() {
        let mut session = Session::new();
        assert!(session.login(&verifier(), "0991234567", "12345678").is_err());

        session.select_role(RoleSelection::community()).unwrap();
        assert!(matches!(
            session.login(&verifier(), "0991234567", "wrong"),
            Err(MaternalError::Authentication(_))
        ));
        assert!(!session.is_authenticated());

        session.login(&verifier(), "0991234567", "12345678").unwrap();
        assert!(session.is_ready());
        assert_eq!(
            session.sections(),
            vec![Section::Home, Section::AfyaBot, Section::Vaccination]
        );
    }

    #[test]
    fn test_job_role_is_mandatory_for_zone_and_aire() {
        let mut session = Session::new();
        session.select_role(aire_selection()).unwrap();
        session.login(&verifier(), "0812345678", "12345678").unwrap();

        assert!(session.requires_job_role());
        assert!(!session.is_ready());
        assert!(session.sections().is_empty());

        session.select_job_role(JobRole::SageFemme).unwrap();
        assert!(session.is_ready());
        assert!(session.can_access(Section::Partogram));
        assert!(session.can_access(Section::Referrals));
        assert!(!session.can_access(Section::Stats));
    }

    #[test]
    fn test_sections_by_job_role() {
        let mut session = Session::new();
        session.select_role(aire_selection()).unwrap();
        session.login(&verifier(), "0812345678", "12345678").unwrap();

        session.select_job_role(JobRole::Infirmier).unwrap();
        assert_eq!(session.sections(), vec![Section::Home, Section::AfyaBot, Section::Cpn]);

        session.select_job_role(JobRole::Admin).unwrap();
        assert_eq!(
            session.sections(),
            vec![Section::Home, Section::AfyaBot, Section::Referrals]
        );
        assert!(matches!(
            session.ensure_access(Section::Partogram),
            Err(MaternalError::Permission(_))
        ));
    }

    #[test]
    fn test_dps_has_stats_without_job_role() {
        let mut session = Session::new();
        let province = HealthDirectory::north_kivu().province("NK").unwrap().clone();
        session.select_role(RoleSelection::dps(province)).unwrap();
        session.login(&verifier(), "0991234567", "12345678").unwrap();

        assert!(!session.requires_job_role());
        assert!(session.select_job_role(JobRole::Admin).is_err());
        assert_eq!(
            session.sections(),
            vec![Section::Home, Section::AfyaBot, Section::Cpn, Section::Stats]
        );
    }

    #[test]
    fn test_logout_keeps_selection_and_quit_clears_it() {
        let mut session = Session::new();
        session.select_role(aire_selection()).unwrap();
        session.login(&verifier(), "0812345678", "12345678").unwrap();
        session.select_job_role(JobRole::Medecin).unwrap();

        assert!(session.select_role(RoleSelection::community()).is_err());

        session.logout();
        assert!(!session.is_authenticated());
        assert_eq!(session.job_role(), None);
        assert_eq!(session.role(), Some(Role::AireDeSante));

        session.login(&verifier(), "0812345678", "12345678").unwrap();
        session.quit();
        assert_eq!(session.role(), None);
        assert_eq!(session.user_id(), None);

        session.select_role(RoleSelection::comfort()).unwrap();
        session.back();
        assert!(session.selection().is_none());
    }
}
