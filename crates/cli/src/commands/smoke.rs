use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use payflow_core::capabilities::{CapabilitySet, StaticCapabilityResolver};
use payflow_core::config::{AppConfig, LoadOptions};
use payflow_core::domain::actor::ActorContext;
use payflow_core::domain::approval::{
    Decision, NewApprovalRequest, ProjectId, ReferenceId, ReferenceType, RequestState,
};
use payflow_core::service::ApprovalService;
use payflow_db::{connect_with_config, migrations, DbPool, SqlApprovalRequestRepository};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{current_thread_runtime, escape_json, CommandResult};

/// Smoke records live under their own tenant so they never show up in real listings.
pub const SMOKE_TENANT: &str = "payflow-smoke";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(passed("config_validation", elapsed_ms, "configuration loaded and validated"));
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(failed("config_validation", elapsed_ms, error.to_string()));
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(failed(
                "db_connectivity",
                0,
                format!("failed to initialize async runtime: {error}"),
            ));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_with_config(&config.database)) {
        Ok(pool) => {
            checks.push(passed(
                "db_connectivity",
                elapsed_since(db_started),
                format!("connected using `{}`", config.database.url),
            ));
            pool
        }
        Err(error) => {
            checks.push(failed(
                "db_connectivity",
                elapsed_since(db_started),
                format!("failed to connect: {error}"),
            ));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let migration_started = Instant::now();
    match runtime.block_on(migrations::run_pending(&pool)) {
        Ok(()) => checks.push(passed(
            "migration_visibility",
            elapsed_since(migration_started),
            "migrations are visible and executable",
        )),
        Err(error) => {
            checks.push(failed(
                "migration_visibility",
                elapsed_since(migration_started),
                format!("migration execution failed: {error}"),
            ));
            checks.push(skipped("approval_roundtrip"));
            runtime.block_on(pool.close());
            return finalize_report(checks, elapsed_since(started));
        }
    }

    let roundtrip_started = Instant::now();
    match runtime.block_on(approval_roundtrip(pool.clone())) {
        Ok(message) => {
            checks.push(passed("approval_roundtrip", elapsed_since(roundtrip_started), message))
        }
        Err(error) => checks.push(failed(
            "approval_roundtrip",
            elapsed_since(roundtrip_started),
            format!("{error:#}"),
        )),
    }
    runtime.block_on(pool.close());

    finalize_report(checks, elapsed_since(started))
}

/// Drives one request through both approval levels and checks the audit trail.
async fn approval_roundtrip(pool: DbPool) -> anyhow::Result<String> {
    let service = ApprovalService::new(
        Arc::new(SqlApprovalRequestRepository::new(pool)),
        Arc::new(StaticCapabilityResolver(CapabilitySet::all())),
    );
    let actor = ActorContext::new("payflow-smoke", SMOKE_TENANT);

    let draft = service
        .create(
            &actor,
            ProjectId("smoke".to_string()),
            NewApprovalRequest {
                name: "smoke check".to_string(),
                amount: Decimal::ONE,
                purpose: Some("operator smoke run".to_string()),
                reference_type: ReferenceType::Task,
                reference_id: ReferenceId(0),
                supplier_id: None,
            },
        )
        .await
        .context("create draft")?;
    service.submit(&actor, &draft.id).await.context("submit draft")?;
    service
        .approve_lv1(&actor, &draft.id, Decision::Approve, "smoke level-one approval")
        .await
        .context("level-one approval")?;
    let approved = service
        .approve_lv2(&actor, &draft.id, Decision::Approve, "smoke level-two approval")
        .await
        .context("level-two approval")?;
    let trail = service.audit_trail(&actor, &draft.id).await.context("read audit trail")?;

    if approved.state != RequestState::ApprovedAll {
        bail!("request {} ended in {}", draft.id, approved.state.as_str());
    }
    if trail.len() != 3 {
        bail!("request {} has {} audit entries, expected 3", draft.id, trail.len());
    }

    Ok(format!(
        "request {} reached {} with {} audit entries",
        draft.id,
        approved.state.as_str(),
        trail.len()
    ))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn passed(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
}

fn failed(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
