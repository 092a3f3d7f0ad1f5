//! 根据配置装配编排器：创建实例、挂载扩展、写入费率与权重。
//!
//! 装配全部通过编排器的管理入口完成，使用配置中的角色地址作为调用方，
//! 因此校验规则与运行期完全一致，启动阶段写入的变更也会进入审计日志。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use crate::config::{AppConfig, ExtensionConfig, OrchestratorConfig, VenueConfig};
use crate::engine::{
    Address, DEFAULT_WEIGHT, Extension, Orchestrator, OrchestratorSettings, RegistryMode, Roles,
};
use crate::extensions::FixedExtension;

pub fn build_orchestrator(config: &AppConfig) -> Result<Arc<Orchestrator>> {
    let settings = resolve_settings(&config.orchestrator)?;
    let roles = settings.roles;
    let orchestrator = Orchestrator::new(settings).context("编排器参数无效")?;

    let catalog = build_catalog(&config.extensions)?;
    for venue in &config.venues {
        apply_venue(&orchestrator, roles, venue, &catalog)
            .with_context(|| format!("场所 {} 装配失败", venue.id))?;
    }

    info!(
        target: "orchestrator::registry",
        mode = %orchestrator.mode(),
        venues = config.venues.len(),
        extensions = catalog.len(),
        "orchestrator bootstrapped"
    );
    Ok(Arc::new(orchestrator))
}

fn resolve_settings(config: &OrchestratorConfig) -> Result<OrchestratorSettings> {
    Ok(OrchestratorSettings {
        mode: config.mode,
        self_address: required("self_address", config.self_address)?,
        upstream: required("upstream", config.upstream)?,
        roles: Roles {
            governance: required("governance", config.governance)?,
            registry_manager: required("registry_manager", config.registry_manager)?,
            owner: required("owner", config.owner)?,
        },
        default_fee: config.default_fee,
        default_method: config.default_method,
        journal_capacity: config.journal_capacity,
    })
}

fn required(field: &str, value: Option<Address>) -> Result<Address> {
    value.ok_or_else(|| anyhow!("orchestrator.{field} 未配置，可执行 `hookmux init` 生成模板"))
}

struct CatalogEntry {
    extension: Arc<dyn Extension>,
    weight: Option<u64>,
}

fn build_catalog(configs: &[ExtensionConfig]) -> Result<HashMap<Address, CatalogEntry>> {
    let mut catalog = HashMap::with_capacity(configs.len());
    for cfg in configs {
        let entry = CatalogEntry {
            extension: Arc::new(FixedExtension::from_config(cfg)),
            weight: cfg.weight,
        };
        if catalog.insert(cfg.address, entry).is_some() {
            bail!("扩展 {} 在 [[extensions]] 中重复声明", cfg.address);
        }
    }
    Ok(catalog)
}

fn apply_venue(
    orchestrator: &Orchestrator,
    roles: Roles,
    venue: &VenueConfig,
    catalog: &HashMap<Address, CatalogEntry>,
) -> Result<()> {
    let extensions = venue
        .extensions
        .iter()
        .map(|address| {
            catalog
                .get(address)
                .map(|entry| Arc::clone(&entry.extension))
                .ok_or_else(|| anyhow!("扩展 {address} 未在 [[extensions]] 中声明"))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(stray) = venue
        .weights
        .keys()
        .find(|address| !venue.extensions.contains(address))
    {
        bail!("weights 中的扩展 {stray} 未挂载到该场所");
    }
    let weights: Vec<(Address, u64)> = venue
        .extensions
        .iter()
        .filter_map(|address| {
            venue
                .weights
                .get(address)
                .copied()
                .or_else(|| catalog.get(address).and_then(|entry| entry.weight))
                .filter(|weight| *weight != DEFAULT_WEIGHT)
                .map(|weight| (*address, weight))
        })
        .collect();

    match orchestrator.mode() {
        RegistryMode::Immutable => {
            orchestrator.register(roles.owner, venue.id, extensions, &weights, venue.method)?;
        }
        RegistryMode::Permissioned => {
            for extension in &extensions {
                orchestrator.approve_extension(roles.registry_manager, extension.address())?;
            }
            orchestrator.add_extensions(roles.registry_manager, venue.id, extensions)?;
            for (address, weight) in &weights {
                orchestrator.set_extension_weight(
                    roles.registry_manager,
                    venue.id,
                    *address,
                    *weight,
                )?;
            }
            if let Some(method) = venue.method {
                orchestrator.set_fee_method(roles.governance, venue.id, method)?;
            }
        }
    }

    if let Some(fee) = venue.default_fee {
        orchestrator.set_default_fee(roles.governance, venue.id, fee)?;
    }
    if let Some(fee) = venue.governance_fee {
        orchestrator.set_governance_fee(roles.governance, venue.id, fee)?;
    }
    if let Some(fee) = venue.venue_specific_fee {
        orchestrator.set_venue_specific_fee(roles.governance, venue.id, fee)?;
    }
    Ok(())
}
