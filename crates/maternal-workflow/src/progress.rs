//! 产程进展评估
//!
//! 按 WHO 产程图判断宫口扩张相对警戒线与处理线的位置：
//! 警戒线自活跃期起点（4 cm，经过时间 0 h）以 1 cm/h 上升，
//! 处理线为警戒线向右平移 4 小时。

use maternal_core::{MaternalError, Result};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// 产程图参考线参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// 活跃期起始扩张（cm）
    pub active_phase_start_cm: f64,
    /// 宫口开全（cm）
    pub full_dilation_cm: f64,
    /// 警戒线速率（cm/h）
    pub dilation_rate_cm_per_hour: f64,
    /// 处理线相对警戒线的延后（h）
    pub action_offset_hours: f64,
    /// 无进展停滞阈值（h）
    pub stall_threshold_hours: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            active_phase_start_cm: 4.0,
            full_dilation_cm: 10.0,
            dilation_rate_cm_per_hour: 1.0,
            action_offset_hours: 4.0,
            stall_threshold_hours: 4.0,
        }
    }
}

impl ProgressConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.active_phase_start_cm,
            self.full_dilation_cm,
            self.dilation_rate_cm_per_hour,
            self.action_offset_hours,
            self.stall_threshold_hours,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MaternalError::Config("产程图参数必须为有限数值".to_string()));
        }
        if self.dilation_rate_cm_per_hour <= 0.0 {
            return Err(MaternalError::Config("警戒线速率必须大于0".to_string()));
        }
        if self.action_offset_hours < 0.0 || self.stall_threshold_hours <= 0.0 {
            return Err(MaternalError::Config("处理线延后与停滞阈值不能为负".to_string()));
        }
        if self.active_phase_start_cm < 0.0 || self.active_phase_start_cm >= self.full_dilation_cm {
            return Err(MaternalError::Config("活跃期起点必须介于0与开全之间".to_string()));
        }
        Ok(())
    }
}

/// 观察点所处区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressZone {
    Normal, // 警戒线上或左侧
    Alert,  // 警戒线与处理线之间
    Action, // 处理线上或右侧
}

/// 评估输入点：自活跃期起点的经过小时数与宫口扩张
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub elapsed_hours: f64,
    pub dilation_cm: f64,
}

impl ProgressPoint {
    pub fn new(elapsed_hours: f64, dilation_cm: f64) -> Self {
        Self {
            elapsed_hours,
            dilation_cm,
        }
    }
}

/// 单点评估结果；潜伏期的点不参与分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAssessment {
    pub index: usize,
    pub elapsed_hours: f64,
    pub dilation_cm: f64,
    pub zone: Option<ProgressZone>,
}

/// 需要临床复核的情况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewFlag {
    /// 两次观察间隔超过阈值且宫口未进展
    Stalled {
        from_index: usize,
        to_index: usize,
        gap_hours: f64,
        dilation_cm: f64,
    },
    /// 宫口扩张回退
    Regression {
        from_index: usize,
        to_index: usize,
        from_cm: f64,
        to_cm: f64,
    },
}

/// 产程进展报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub points: Vec<PointAssessment>,
    pub flags: Vec<ReviewFlag>,
    /// 第一个活跃期观察点
    pub active_phase_index: Option<usize>,
}

impl ProgressReport {
    /// 已达到的最差区域
    pub fn worst_zone(&self) -> Option<ProgressZone> {
        self.points.iter().filter_map(|p| p.zone).max()
    }

    /// 最近一次观察的区域
    pub fn latest_zone(&self) -> Option<ProgressZone> {
        self.points.last().and_then(|p| p.zone)
    }

    pub fn needs_review(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// 警戒线/处理线评估器
#[derive(Debug, Clone)]
pub struct ProgressEvaluator {
    config: ProgressConfig,
}

impl ProgressEvaluator {
    pub fn new(config: ProgressConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    /// 警戒线在给定时间的扩张值（止于开全）
    pub fn alert_line(&self, elapsed_hours: f64) -> f64 {
        (self.config.active_phase_start_cm + self.config.dilation_rate_cm_per_hour * elapsed_hours)
            .min(self.config.full_dilation_cm)
    }

    /// 处理线在给定时间的扩张值
    pub fn action_line(&self, elapsed_hours: f64) -> f64 {
        self.alert_line(elapsed_hours - self.config.action_offset_hours)
    }

    /// 对单个活跃期观察点分类
    ///
    /// 比较在时间轴上进行：警戒线到达该扩张值的时刻之前（含）为正常，
    /// 处理线到达该扩张值的时刻之后（含）为需处理。
    pub fn classify(&self, point: ProgressPoint) -> ProgressZone {
        let alert_time = (point.dilation_cm - self.config.active_phase_start_cm)
            / self.config.dilation_rate_cm_per_hour;
        let action_time = alert_time + self.config.action_offset_hours;

        if point.elapsed_hours <= alert_time + EPSILON {
            ProgressZone::Normal
        } else if point.elapsed_hours + EPSILON >= action_time {
            ProgressZone::Action
        } else {
            ProgressZone::Alert
        }
    }

    /// 评估一组按时间排序的观察点
    pub fn evaluate(&self, points: &[ProgressPoint]) -> Result<ProgressReport> {
        self.validate_points(points)?;

        let start = self.config.active_phase_start_cm;
        let active_phase_index = points.iter().position(|p| p.dilation_cm + EPSILON >= start);

        let assessed: Vec<PointAssessment> = points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let zone = match active_phase_index {
                    Some(first) if index >= first => Some(self.classify(*point)),
                    _ => None,
                };
                tracing::debug!(
                    "Point {} at {:.2}h / {:.1}cm classified as {:?}",
                    index,
                    point.elapsed_hours,
                    point.dilation_cm,
                    zone
                );
                PointAssessment {
                    index,
                    elapsed_hours: point.elapsed_hours,
                    dilation_cm: point.dilation_cm,
                    zone,
                }
            })
            .collect();

        let mut flags = Vec::new();
        for (index, pair) in points.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            let (from_index, to_index) = (index, index + 1);

            if next.dilation_cm + EPSILON < prev.dilation_cm {
                flags.push(ReviewFlag::Regression {
                    from_index,
                    to_index,
                    from_cm: prev.dilation_cm,
                    to_cm: next.dilation_cm,
                });
            }

            let both_active = matches!(active_phase_index, Some(first) if from_index >= first);
            let gap_hours = next.elapsed_hours - prev.elapsed_hours;
            if both_active
                && gap_hours > self.config.stall_threshold_hours + EPSILON
                && next.dilation_cm <= prev.dilation_cm + EPSILON
            {
                flags.push(ReviewFlag::Stalled {
                    from_index,
                    to_index,
                    gap_hours,
                    dilation_cm: next.dilation_cm,
                });
            }
        }

        let report = ProgressReport {
            points: assessed,
            flags,
            active_phase_index,
        };

        match report.worst_zone() {
            Some(ProgressZone::Action) => tracing::warn!("Labor progress crossed the action line"),
            Some(ProgressZone::Alert) => tracing::warn!("Labor progress crossed the alert line"),
            _ => {}
        }
        if report.needs_review() {
            tracing::warn!("{} observation(s) flagged for clinical review", report.flags.len());
        }

        Ok(report)
    }

    fn validate_points(&self, points: &[ProgressPoint]) -> Result<()> {
        for (index, point) in points.iter().enumerate() {
            if !point.elapsed_hours.is_finite() || !point.dilation_cm.is_finite() {
                return Err(MaternalError::Validation(format!("第{}个观察点包含无效数值", index)));
            }
            if point.dilation_cm < 0.0 || point.dilation_cm > self.config.full_dilation_cm {
                return Err(MaternalError::Validation(format!(
                    "第{}个观察点宫口扩张 {} cm 超出范围",
                    index, point.dilation_cm
                )));
            }
        }

        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].elapsed_hours <= pair[0].elapsed_hours)
        {
            return Err(MaternalError::Validation(format!(
                "观察时间必须严格递增（第{}与第{}个观察点）",
                index,
                index + 1
            )));
        }

        Ok(())
    }
}

impl Default for ProgressEvaluator {
    fn default() -> Self {
        Self {
            config: ProgressConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(report: &ProgressReport) -> Vec<Option<ProgressZone>> {
        report.points.iter().map(|p| p.zone).collect()
    }

    #[test]
    fn test_reference_points() {
        let evaluator = ProgressEvaluator::default();

        // 警戒线起点
        assert_eq!(evaluator.classify(ProgressPoint::new(0.0, 4.0)), ProgressZone::Normal);
        // 6小时无进展
        assert_eq!(evaluator.classify(ProgressPoint::new(6.0, 4.0)), ProgressZone::Action);
        // 约1.25 cm/h
        assert_eq!(evaluator.classify(ProgressPoint::new(2.0, 6.5)), ProgressZone::Normal);
    }

    #[test]
    fn test_zone_boundaries() {
        let evaluator = ProgressEvaluator::default();

        assert_eq!(evaluator.classify(ProgressPoint::new(3.0, 7.0)), ProgressZone::Normal);
        assert_eq!(evaluator.classify(ProgressPoint::new(3.5, 7.0)), ProgressZone::Alert);
        assert_eq!(evaluator.classify(ProgressPoint::new(7.0, 7.0)), ProgressZone::Action);
        assert_eq!(evaluator.classify(ProgressPoint::new(6.5, 10.0)), ProgressZone::Alert);
        assert_eq!(evaluator.classify(ProgressPoint::new(6.0, 10.0)), ProgressZone::Normal);
    }

    #[test]
    fn test_reference_lines() {
        let evaluator = ProgressEvaluator::default();
        assert_eq!(evaluator.alert_line(0.0), 4.0);
        assert_eq!(evaluator.alert_line(6.0), 10.0);
        assert_eq!(evaluator.alert_line(9.0), 10.0);
        assert_eq!(evaluator.action_line(4.0), 4.0);
        assert_eq!(evaluator.action_line(10.0), 10.0);
    }

    #[test]
    fn test_latent_points_are_excluded() {
        let evaluator = ProgressEvaluator::default();
        let report = evaluator
            .evaluate(&[
                ProgressPoint::new(-3.0, 2.0),
                ProgressPoint::new(0.0, 4.0),
                ProgressPoint::new(1.0, 5.0),
            ])
            .unwrap();

        assert_eq!(report.active_phase_index, Some(1));
        assert_eq!(
            zones(&report),
            vec![None, Some(ProgressZone::Normal), Some(ProgressZone::Normal)]
        );
    }

    #[test]
    fn test_progression_into_action() {
        let evaluator = ProgressEvaluator::default();
        let report = evaluator
            .evaluate(&[
                ProgressPoint::new(0.0, 4.0),
                ProgressPoint::new(2.0, 5.0),
                ProgressPoint::new(6.0, 6.0),
            ])
            .unwrap();

        assert_eq!(
            zones(&report),
            vec![
                Some(ProgressZone::Normal),
                Some(ProgressZone::Alert),
                Some(ProgressZone::Action)
            ]
        );
        assert_eq!(report.worst_zone(), Some(ProgressZone::Action));
        assert_eq!(report.latest_zone(), Some(ProgressZone::Action));
        assert!(!report.needs_review());
    }

    #[test]
    fn test_regression_is_flagged() {
        let evaluator = ProgressEvaluator::default();
        let report = evaluator
            .evaluate(&[ProgressPoint::new(0.0, 5.0), ProgressPoint::new(1.0, 4.5)])
            .unwrap();

        assert_eq!(
            report.flags,
            vec![ReviewFlag::Regression {
                from_index: 0,
                to_index: 1,
                from_cm: 5.0,
                to_cm: 4.5
            }]
        );
    }

    #[test]
    fn test_stall_requires_gap_and_no_progress() {
        let evaluator = ProgressEvaluator::default();

        let stalled = evaluator
            .evaluate(&[ProgressPoint::new(0.0, 5.0), ProgressPoint::new(4.5, 5.0)])
            .unwrap();
        assert!(matches!(
            stalled.flags.as_slice(),
            [ReviewFlag::Stalled { from_index: 0, to_index: 1, .. }]
        ));

        // 间隔恰好等于阈值
        let at_threshold = evaluator
            .evaluate(&[ProgressPoint::new(0.0, 5.0), ProgressPoint::new(4.0, 5.0)])
            .unwrap();
        assert!(at_threshold.flags.is_empty());

        // 长间隔但有进展
        let progressing = evaluator
            .evaluate(&[ProgressPoint::new(0.0, 5.0), ProgressPoint::new(5.0, 6.0)])
            .unwrap();
        assert!(progressing.flags.is_empty());

        // 潜伏期内的长间隔不计
        let latent = evaluator
            .evaluate(&[ProgressPoint::new(-8.0, 2.0), ProgressPoint::new(-2.0, 2.0)])
            .unwrap();
        assert!(latent.flags.is_empty());
    }

    #[test]
    fn test_stall_threshold_is_configurable() {
        let evaluator = ProgressEvaluator::new(ProgressConfig {
            stall_threshold_hours: 2.0,
            ..Default::default()
        })
        .unwrap();

        let report = evaluator
            .evaluate(&[ProgressPoint::new(0.0, 6.0), ProgressPoint::new(2.5, 6.0)])
            .unwrap();
        assert_eq!(report.flags.len(), 1);
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let evaluator = ProgressEvaluator::default();

        assert!(evaluator
            .evaluate(&[ProgressPoint::new(1.0, 4.0), ProgressPoint::new(1.0, 5.0)])
            .is_err());
        assert!(evaluator.evaluate(&[ProgressPoint::new(0.0, 11.0)]).is_err());
        assert!(evaluator.evaluate(&[ProgressPoint::new(f64::NAN, 4.0)]).is_err());
        assert!(evaluator.evaluate(&[]).unwrap().points.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(ProgressEvaluator::new(ProgressConfig {
            dilation_rate_cm_per_hour: 0.0,
            ..Default::default()
        })
        .is_err());
        assert!(ProgressEvaluator::new(ProgressConfig {
            active_phase_start_cm: 10.0,
            ..Default::default()
        })
        .is_err());
    }
}
