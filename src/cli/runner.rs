use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::args::{Cli, Command, SimulateCmd};
use crate::cli::context::init_configs;
use crate::config::AppConfig;
use crate::config::launch::build_orchestrator;
use crate::engine::{
    Address, Delta, DonateParams, EventContext, FeeCalculationMethod, InitializeParams,
    JournalEntry, LifecycleEvent, ModifyLiquidityParams, Orchestrator, Settled, SwapOutcome,
    SwapParams, VenueId,
};

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Init(args) => init_configs(args),
        Command::Check => {
            let orchestrator = build_orchestrator(&config)?;
            for line in venue_table(&orchestrator) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Simulate(args) => {
            let orchestrator = build_orchestrator(&config)?;
            let report = simulate(&orchestrator, &args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Run => serve(&config).await,
    }
}

async fn serve(config: &AppConfig) -> Result<()> {
    if config.global.prometheus.enable {
        let listen = crate::monitoring::try_init_prometheus(&config.global.prometheus.listen)?;
        info!(target: "monitoring", %listen, "prometheus exporter listening");
    }

    let orchestrator = build_orchestrator(config)?;
    for line in venue_table(&orchestrator) {
        info!(target: "orchestrator::registry", "{line}");
    }
    if orchestrator.venues().is_empty() {
        warn!(target: "orchestrator::registry", "未配置任何场所，所有分发将走空注册表路径");
    }

    tokio::signal::ctrl_c()
        .await
        .context("监听 Ctrl-C 信号失败")?;
    info!(
        target: "orchestrator::registry",
        journal = orchestrator.journal_sequence(),
        "收到退出信号，编排器停止"
    );
    Ok(())
}

fn venue_table(orchestrator: &Orchestrator) -> Vec<String> {
    let roles = orchestrator.roles();
    let mut lines = vec![
        format!(
            "mode={} self={} upstream={}",
            orchestrator.mode(),
            orchestrator.address(),
            orchestrator.upstream()
        ),
        format!(
            "governance={} registry_manager={} owner={}",
            roles.governance, roles.registry_manager, roles.owner
        ),
    ];
    for venue in orchestrator.venues() {
        let fees = orchestrator.fee_config(&venue);
        lines.push(format!(
            "venue {venue}: method={} default_fee={} governance_fee={} venue_specific_fee={}",
            fees.method(),
            fees.default_fee(),
            display_fee(fees.governance_fee()),
            display_fee(fees.venue_specific_fee()),
        ));
        for (position, extension) in orchestrator.extensions(&venue).into_iter().enumerate() {
            let weight = orchestrator
                .extension_weight(&venue, &extension)
                .unwrap_or_default();
            let approved = if orchestrator.is_approved(&extension) {
                "approved"
            } else {
                "-"
            };
            lines.push(format!(
                "  #{position} {extension} weight={weight} {approved}"
            ));
        }
    }
    lines
}

fn display_fee(fee: Option<u32>) -> String {
    fee.map_or_else(|| "-".to_string(), |fee| fee.to_string())
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    venue: VenueId,
    event: LifecycleEvent,
    caller: Address,
    method: FeeCalculationMethod,
    extensions: Vec<Address>,
    outcome: SimulationOutcome,
    journal: Vec<JournalEntry>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
enum SimulationOutcome {
    Acknowledged,
    Delta(Delta),
    Swap(SwapOutcome),
    Unspecified(i128),
}

fn simulate(orchestrator: &Orchestrator, args: &SimulateCmd) -> Result<SimulationReport> {
    let caller = orchestrator.upstream();
    let venue = args.venue;
    let sender = caller;
    let amount = args.amount;

    let swap = SwapParams {
        zero_for_one: args.zero_for_one,
        amount_specified: amount,
        sqrt_price_limit_x96: if args.zero_for_one { 0 } else { u128::MAX },
    };
    let liquidity = |liquidity_delta: i128| ModifyLiquidityParams {
        tick_lower: -887_220,
        tick_upper: 887_220,
        liquidity_delta,
        salt: [0u8; 32],
    };
    let initialize = InitializeParams {
        sqrt_price_x96: 1u128 << 96,
        tick: 0,
    };
    let donate = DonateParams {
        amount0: amount.unsigned_abs(),
        amount1: 0,
    };

    let outcome = match args.event {
        LifecycleEvent::BeforeInitialize => orchestrator
            .before_initialize(caller, &event_context(venue, sender, initialize))
            .map(|_| SimulationOutcome::Acknowledged),
        LifecycleEvent::AfterInitialize => orchestrator
            .after_initialize(caller, &event_context(venue, sender, initialize))
            .map(|_| SimulationOutcome::Acknowledged),
        LifecycleEvent::BeforeAddLiquidity => orchestrator
            .before_add_liquidity(caller, &event_context(venue, sender, liquidity(amount)))
            .map(|_| SimulationOutcome::Acknowledged),
        LifecycleEvent::AfterAddLiquidity => orchestrator
            .after_add_liquidity(
                caller,
                &event_context(venue, sender, Settled {
                    params: liquidity(amount),
                    balance_delta: Delta::new(amount.saturating_neg(), amount.saturating_neg()),
                }),
            )
            .map(SimulationOutcome::Delta),
        LifecycleEvent::BeforeRemoveLiquidity => orchestrator
            .before_remove_liquidity(
                caller,
                &event_context(venue, sender, liquidity(amount.saturating_neg())),
            )
            .map(|_| SimulationOutcome::Acknowledged),
        LifecycleEvent::AfterRemoveLiquidity => orchestrator
            .after_remove_liquidity(
                caller,
                &event_context(venue, sender, Settled {
                    params: liquidity(amount.saturating_neg()),
                    balance_delta: Delta::new(amount, amount),
                }),
            )
            .map(SimulationOutcome::Delta),
        LifecycleEvent::BeforeSwap => orchestrator
            .before_swap(caller, &event_context(venue, sender, swap))
            .map(SimulationOutcome::Swap),
        LifecycleEvent::AfterSwap => orchestrator
            .after_swap(
                caller,
                &event_context(venue, sender, Settled {
                    params: swap,
                    balance_delta: Delta::new(amount, amount.saturating_neg()),
                }),
            )
            .map(SimulationOutcome::Unspecified),
        LifecycleEvent::BeforeDonate => orchestrator
            .before_donate(caller, &event_context(venue, sender, donate))
            .map(|_| SimulationOutcome::Acknowledged),
        LifecycleEvent::AfterDonate => orchestrator
            .after_donate(caller, &event_context(venue, sender, donate))
            .map(|_| SimulationOutcome::Acknowledged),
    }
    .with_context(|| format!("场所 {venue} 的 {} 分发失败", args.event))?;

    let journal = orchestrator
        .journal()
        .into_iter()
        .filter(|entry| matches!(entry, JournalEntry::Dispatch(_)))
        .collect();

    Ok(SimulationReport {
        venue,
        event: args.event,
        caller,
        method: orchestrator.fee_config(&venue).method(),
        extensions: orchestrator.extensions(&venue),
        outcome,
        journal,
    })
}

fn event_context<P>(venue: VenueId, sender: Address, params: P) -> EventContext<'static, P> {
    EventContext {
        venue,
        sender,
        params,
        hook_data: &[],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cli::context::load_configuration;

    fn template_orchestrator() -> Arc<Orchestrator> {
        let path = std::path::PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/hookmux.toml"));
        let config = load_configuration(Some(path)).expect("load template");
        build_orchestrator(&config).expect("bootstrap template")
    }

    fn args(venue: &str, event: LifecycleEvent) -> SimulateCmd {
        SimulateCmd {
            venue: venue.parse().expect("venue id"),
            event,
            amount: -1_000_000,
            zero_for_one: true,
        }
    }

    const WEIGHTED_VENUE: &str = "9sHdH2pw5Ur4rFGYfK5Jygfb2c3Q4tAuMh9yLEvREABr";
    const GOVERNED_VENUE: &str = "2JS7fhi453hhdnZKkfaPdftFKEY7z38d6ZPUHKY8XCxm";

    #[test]
    fn simulated_swap_merges_template_extensions() {
        let orchestrator = template_orchestrator();
        let report = simulate(&orchestrator, &args(WEIGHTED_VENUE, LifecycleEvent::BeforeSwap))
            .expect("simulate");
        let SimulationOutcome::Swap(outcome) = &report.outcome else {
            panic!("unexpected outcome: {:?}", report.outcome);
        };
        // (2500 * 2 + 500 * 1) / 3，第三个扩展弃权
        assert_eq!(outcome.fee, 1_833);
        assert_eq!(outcome.delta, Delta::new(0, -120));
        assert_eq!(report.extensions.len(), 3);
        assert_eq!(report.journal.len(), 1);

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"kind\":\"swap\""));
    }

    #[test]
    fn governance_only_venue_uses_governance_fee() {
        let orchestrator = template_orchestrator();
        let report = simulate(&orchestrator, &args(GOVERNED_VENUE, LifecycleEvent::BeforeSwap))
            .expect("simulate");
        let SimulationOutcome::Swap(outcome) = &report.outcome else {
            panic!("unexpected outcome: {:?}", report.outcome);
        };
        assert_eq!(outcome.fee, 1_000);
    }

    #[test]
    fn configured_failure_aborts_simulation() {
        let orchestrator = template_orchestrator();
        let err = simulate(&orchestrator, &args(WEIGHTED_VENUE, LifecycleEvent::BeforeDonate))
            .err()
            .expect("donate should fail");
        assert!(err.to_string().contains("before_donate"));
        assert!(!orchestrator.is_dispatching());
    }

    #[test]
    fn venue_table_lists_every_extension() {
        let orchestrator = template_orchestrator();
        let table = venue_table(&orchestrator);
        // 两行角色信息 + 每个场所一行 + 四个挂载
        assert_eq!(table.len(), 2 + 2 + 4);
        assert!(table.iter().any(|line| line.contains("governance_only")));
    }
}
