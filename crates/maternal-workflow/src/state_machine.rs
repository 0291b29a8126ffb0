//! 状态机
//!
//! 管理产程图与转诊的生命周期状态转换

use maternal_core::{MaternalError, PartographStatus, ReferralStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// 产程图状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PartographEvent {
    Deliver, // 分娩完成
    Refer,   // 转出
}

/// 转诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReferralEvent {
    Dispatch, // 出发
    Arrive,   // 到达接收机构
    Complete, // 处理完毕
}

/// 通用状态转换表
#[derive(Debug)]
pub struct StateMachine<S, E> {
    transitions: HashMap<(S, E), S>,
}

/// 产程图状态机
pub type PartographStateMachine = StateMachine<PartographStatus, PartographEvent>;
/// 转诊状态机
pub type ReferralStateMachine = StateMachine<ReferralStatus, ReferralEvent>;

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Hash + Debug,
{
    pub fn from_rules(rules: &[(S, E, S)]) -> Self {
        let transitions = rules.iter().map(|&(from, event, to)| ((from, event), to)).collect();
        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: S, event: E) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: S, event: E) -> Result<S> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| MaternalError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            })
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: S) -> Vec<E> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }

    /// 是否为终止状态
    pub fn is_terminal(&self, state: S) -> bool {
        self.possible_events(state).is_empty()
    }
}

impl PartographStateMachine {
    pub fn new() -> Self {
        Self::from_rules(&[
            (PartographStatus::Active, PartographEvent::Deliver, PartographStatus::Closed),
            (PartographStatus::Active, PartographEvent::Refer, PartographStatus::Referred),
        ])
    }
}

impl Default for PartographStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferralStateMachine {
    pub fn new() -> Self {
        Self::from_rules(&[
            (ReferralStatus::Pending, ReferralEvent::Dispatch, ReferralStatus::InTransit),
            (ReferralStatus::InTransit, ReferralEvent::Arrive, ReferralStatus::Received),
            (ReferralStatus::Received, ReferralEvent::Complete, ReferralStatus::Completed),
        ])
    }

    /// 从当前状态向前推进一步的事件
    pub fn forward_event(&self, current: ReferralStatus) -> Option<ReferralEvent> {
        self.possible_events(current).into_iter().next()
    }
}

impl Default for ReferralStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
