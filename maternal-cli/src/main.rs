//! MaternalCare+ 命令行工具

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use maternal_admin::{init_tracing, ConfigManager, LogFormat, MaternalConfig};
use maternal_core::{
    BloodPressure, DeliveryMode, DeliveryOutcome, EvolutionRecord, Gender, InitialExam, Liquor,
    PartographStatus, ReferralPriority, ReferralStatus, RiskLevel,
};
use maternal_storage::LocalStore;
use maternal_workflow::{NewPatient, ObservationInput, TransferRequest, WorkflowEngine};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "maternalcare")]
#[command(about = "MaternalCare+ 孕产妇保健登记与产程管理")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 数据目录（覆盖配置）
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    /// 日志级别（覆盖配置）
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 以 JSON 输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 患者登记与检索
    #[command(subcommand)]
    Patient(PatientCommand),
    /// 产前检查
    #[command(subcommand)]
    Visit(VisitCommand),
    /// 破伤风疫苗接种
    #[command(subcommand)]
    Vaccination(VaccinationCommand),
    /// 产程图
    #[command(subcommand)]
    Partograph(PartographCommand),
    /// 转诊
    #[command(subcommand)]
    Referral(ReferralCommand),
    /// 登记统计
    Stats,
    /// 配置
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum PatientCommand {
    /// 登记新患者
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        postname: Option<String>,
        #[arg(long)]
        age: u8,
        #[arg(long)]
        phone: String,
        #[arg(long, value_enum, default_value = "low")]
        risk: RiskArg,
        #[arg(long)]
        structure: Option<String>,
        #[arg(long)]
        gestational_age: Option<u8>,
    },
    /// 列出全部患者
    List,
    /// 按姓名或电话检索
    Search { query: String },
    /// 查看患者档案
    Show { id: String },
    /// 调整风险等级
    Risk {
        id: String,
        #[arg(value_enum)]
        level: RiskArg,
    },
}

#[derive(Subcommand, Debug)]
enum VisitCommand {
    /// 记录一次产前检查
    Add(VisitArgs),
}

#[derive(Args, Debug)]
struct VisitArgs {
    patient_id: String,
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    months_weeks: String,
    #[arg(long)]
    weight: f64,
    #[arg(long)]
    bp: BloodPressure,
    #[arg(long)]
    fhr: u16,
    #[arg(long, default_value = "Céphalique")]
    presentation: String,
    #[arg(long)]
    fetal_movements: bool,
    #[arg(long)]
    edema: bool,
    #[arg(long, default_value = "-")]
    albuminuria: String,
    #[arg(long, default_value = "-")]
    glucosuria: String,
}

#[derive(Subcommand, Debug)]
enum VaccinationCommand {
    /// 记录下一剂 VAT
    Record {
        patient_id: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// 查看接种日程
    Schedule {
        patient_id: String,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum PartographCommand {
    /// 入院开立产程图
    Open {
        patient_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long, default_value = "Céphalique")]
        presentation: String,
        #[arg(long, default_value = "OIGA")]
        position: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        station: i8,
    },
    /// 录入观察
    Observe(ObserveArgs),
    /// 评估产程进展
    Assess { id: String },
    /// 分娩完成
    Close(CloseArgs),
    /// 转出
    Refer {
        id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        reason: String,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
    },
    /// 列出产程图
    List {
        #[arg(long)]
        active: bool,
    },
    /// 查看产程图
    Show { id: String },
}

#[derive(Args, Debug)]
struct ObserveArgs {
    id: String,
    #[arg(long)]
    time: Option<DateTime<Utc>>,
    #[arg(long)]
    dilation: f64,
    #[arg(long)]
    fhr: u16,
    #[arg(long)]
    contractions: u8,
    #[arg(long)]
    bp: BloodPressure,
    #[arg(long)]
    pulse: u16,
    #[arg(long)]
    temperature: f64,
    #[arg(long, value_enum, default_value = "intact")]
    liquor: LiquorArg,
    #[arg(long, default_value_t = 0)]
    moulding: u8,
}

#[derive(Args, Debug)]
struct CloseArgs {
    id: String,
    #[arg(long)]
    time: Option<DateTime<Utc>>,
    #[arg(long, value_enum, default_value = "eutocic")]
    mode: ModeArg,
    #[arg(long)]
    apgar1: u8,
    #[arg(long)]
    apgar5: u8,
    /// 新生儿体重（克）
    #[arg(long)]
    weight: u32,
    #[arg(long, value_enum)]
    gender: GenderArg,
}

#[derive(Subcommand, Debug)]
enum ReferralCommand {
    /// 列出转诊
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// 查看转诊
    Show { id: String },
    /// 推进到下一状态
    Advance { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// 显示生效配置
    Show,
    /// 读取单个配置值
    Get { path: String },
    /// 将生效配置写入配置文件
    Init,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LiquorArg {
    Clear,
    Meconium,
    Blood,
    Intact,
}

impl From<LiquorArg> for Liquor {
    fn from(arg: LiquorArg) -> Self {
        match arg {
            LiquorArg::Clear => Liquor::Clear,
            LiquorArg::Meconium => Liquor::Meconium,
            LiquorArg::Blood => Liquor::Blood,
            LiquorArg::Intact => Liquor::Intact,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Eutocic,
    CSection,
    Instrumental,
}

impl From<ModeArg> for DeliveryMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Eutocic => DeliveryMode::Eutocic,
            ModeArg::CSection => DeliveryMode::CSection,
            ModeArg::Instrumental => DeliveryMode::Instrumental,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GenderArg {
    M,
    F,
}

impl From<GenderArg> for Gender {
    fn from(arg: GenderArg) -> Self {
        match arg {
            GenderArg::M => Gender::Male,
            GenderArg::F => Gender::Female,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
    Routine,
    Emergency,
    Vital,
}

impl From<PriorityArg> for ReferralPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Routine => ReferralPriority::Routine,
            PriorityArg::Emergency => ReferralPriority::Emergency,
            PriorityArg::Vital => ReferralPriority::Vital,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Pending,
    InTransit,
    Received,
    Completed,
}

impl From<StatusArg> for ReferralStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => ReferralStatus::Pending,
            StatusArg::InTransit => ReferralStatus::InTransit,
            StatusArg::Received => ReferralStatus::Received,
            StatusArg::Completed => ReferralStatus::Completed,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", out);
    Ok(())
}

fn effective_config(cli: &Cli, mut config: MaternalConfig) -> MaternalConfig {
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(cli.config.as_deref()).context("加载配置失败")?;
    let config = effective_config(&cli, manager.get_config().await);
    init_tracing(&config.logging)?;

    if let Command::Config(command) = &cli.command {
        return run_config(command, &manager, &config).await;
    }

    info!("使用数据目录: {}", config.storage.data_dir);
    let store = Arc::new(LocalStore::open(&config.storage.data_dir));
    let engine = WorkflowEngine::new(
        store,
        config.partograph.progress.clone(),
        config.partograph.vitals.clone(),
    )?;

    match cli.command {
        Command::Patient(command) => run_patient(command, &engine).await,
        Command::Visit(VisitCommand::Add(args)) => {
            let record = EvolutionRecord {
                date: args.date,
                months_weeks: args.months_weeks,
                weight: args.weight,
                bp: args.bp,
                fetal_movements: args.fetal_movements,
                fetal_heart_rate: args.fhr,
                presentation: args.presentation,
                edema: args.edema,
                albuminuria: args.albuminuria,
                glucosuria: args.glucosuria,
            };
            print_json(&engine.registry().record_visit(&args.patient_id, record).await?)
        }
        Command::Vaccination(command) => run_vaccination(command, &engine).await,
        Command::Partograph(command) => run_partograph(command, &engine).await,
        Command::Referral(command) => run_referral(command, &engine).await,
        Command::Stats => print_json(&engine.statistics().await?),
        Command::Config(_) => Ok(()),
    }
}

async fn run_config(command: &ConfigCommand, manager: &ConfigManager, config: &MaternalConfig) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
            Ok(())
        }
        ConfigCommand::Get { path } => {
            let value: serde_json::Value = manager.get_value(path).await?;
            print_json(&value)
        }
        ConfigCommand::Init => {
            manager.update_config(config.clone()).await?;
            Ok(())
        }
    }
}

async fn run_patient(command: PatientCommand, engine: &WorkflowEngine) -> Result<()> {
    let registry = engine.registry();
    match command {
        PatientCommand::Register {
            name,
            postname,
            age,
            phone,
            risk,
            structure,
            gestational_age,
        } => {
            let patient = registry
                .register(NewPatient {
                    name,
                    postname,
                    age,
                    phone,
                    risk_level: risk.into(),
                    structure_id: structure,
                    gestational_age,
                    ..Default::default()
                })
                .await?;
            print_json(&patient)
        }
        PatientCommand::List => print_json(&registry.list().await?),
        PatientCommand::Search { query } => print_json(&registry.search(&query).await?),
        PatientCommand::Show { id } => print_json(&registry.get(&id).await?),
        PatientCommand::Risk { id, level } => print_json(&registry.update_risk(&id, level.into()).await?),
    }
}

async fn run_vaccination(command: VaccinationCommand, engine: &WorkflowEngine) -> Result<()> {
    let registry = engine.registry();
    match command {
        VaccinationCommand::Record { patient_id, date } => {
            let (_, dose) = registry.record_vat_dose(&patient_id, date).await?;
            println!("{:?} recorded on {}", dose, date);
            Ok(())
        }
        VaccinationCommand::Schedule { patient_id, today } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            print_json(&registry.vaccination_schedule(&patient_id, today).await?)
        }
    }
}

async fn run_partograph(command: PartographCommand, engine: &WorkflowEngine) -> Result<()> {
    let desk = engine.partographs();
    match command {
        PartographCommand::Open {
            patient_id,
            user,
            start,
            presentation,
            position,
            station,
        } => {
            let exam = InitialExam {
                presentation,
                position,
                station,
            };
            let partograph = desk
                .open(&patient_id, &user, start.unwrap_or_else(Utc::now), exam)
                .await?;
            print_json(&partograph)
        }
        PartographCommand::Observe(args) => {
            let input = ObservationInput {
                time: args.time.unwrap_or_else(Utc::now),
                cervical_dilatation: args.dilation,
                fetal_heart_rate: args.fhr,
                contractions: args.contractions,
                blood_pressure: args.bp,
                maternal_pulse: args.pulse,
                temperature: args.temperature,
                liquor: args.liquor.into(),
                moulding: args.moulding,
            };
            print_json(&desk.record_observation(&args.id, input).await?)
        }
        PartographCommand::Assess { id } => print_json(&desk.assess(&id).await?),
        PartographCommand::Close(args) => {
            let outcome = DeliveryOutcome {
                delivery_time: args.time.unwrap_or_else(Utc::now),
                mode: args.mode.into(),
                apgar1: args.apgar1,
                apgar5: args.apgar5,
                baby_weight: args.weight,
                gender: args.gender.into(),
            };
            print_json(&desk.close(&args.id, outcome).await?)
        }
        PartographCommand::Refer {
            id,
            from,
            to,
            reason,
            priority,
        } => {
            let request = TransferRequest {
                from_structure_id: from,
                to_structure_id: to,
                reason,
                priority: priority.map(Into::into),
            };
            let (_, referral) = desk.refer(&id, request).await?;
            print_json(&referral)
        }
        PartographCommand::List { active } => {
            let partographs = if active { desk.active().await? } else { desk.all().await? };
            for p in &partographs {
                let marker = match p.status {
                    PartographStatus::Active => "*",
                    _ => " ",
                };
                println!(
                    "{} {}  patient={}  start={}  observations={}  {:?}",
                    marker,
                    p.id,
                    p.patient_id,
                    p.start_time.format("%Y-%m-%d %H:%M"),
                    p.observations.len(),
                    p.status
                );
            }
            Ok(())
        }
        PartographCommand::Show { id } => print_json(&desk.get(&id).await?),
    }
}

async fn run_referral(command: ReferralCommand, engine: &WorkflowEngine) -> Result<()> {
    let desk = engine.referrals();
    match command {
        ReferralCommand::List { status } => {
            let referrals = match status {
                Some(status) => desk.list_by_status(status.into()).await?,
                None => desk.list().await?,
            };
            print_json(&referrals)
        }
        ReferralCommand::Show { id } => print_json(&desk.get(&id).await?),
        ReferralCommand::Advance { id } => {
            let referral = desk.advance(&id).await?;
            let to = engine
                .directory()
                .structure(&referral.to_structure_id)
                .map(|s| s.name)
                .unwrap_or_else(|_| referral.to_structure_id.clone());
            info!("Referral {} now {:?} (to {})", referral.id, referral.status, to);
            print_json(&referral)
        }
    }
}
