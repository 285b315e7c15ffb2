//! RON scenarios: a scripted sequence of effect operations against a set of
//! authoritative entities, each mirrored by a predicting client.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gameplay_core::{
    AbilitySystemComponent, AbilitySystemContext, ActiveEffectQuery, ApplyOutcome,
    AttributeHandle, EffectDefId, EntityId, GameplayTag, NetRole, NumericAttributeSet,
    PredictionKey,
};
use serde::{Deserialize, Serialize};

/// Tolerance for `Expect` comparisons.
const EPSILON: f32 = 1e-4;

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Entity ids to spawn; each gets every default attribute set.
    pub entities: Vec<u32>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize)]
pub enum Step {
    /// Server-side application. `source` defaults to the target itself.
    Apply {
        target: u32,
        effect: EffectDefId,
        #[serde(default = "default_level")]
        level: f32,
        #[serde(default)]
        source: Option<u32>,
        #[serde(default)]
        set_by_caller: BTreeMap<String, f32>,
    },
    /// Client-side prediction followed by the server's verdict.
    Predict {
        target: u32,
        effect: EffectDefId,
        #[serde(default = "default_level")]
        level: f32,
        /// When false the server rejects the key and the client rolls back.
        accept: bool,
    },
    Remove { target: u32, effect: EffectDefId },
    AddTag { target: u32, tag: GameplayTag },
    RemoveTag { target: u32, tag: GameplayTag },
    /// Advances every server and client clock.
    Tick(f32),
    /// Ships every server snapshot to its client over the wire encoding.
    Replicate,
    Expect {
        target: u32,
        attribute: AttributeHandle,
        value: f32,
        /// Check the client mirror instead of the server.
        #[serde(default)]
        client: bool,
    },
    ExpectTag {
        target: u32,
        tag: GameplayTag,
        present: bool,
    },
    ExpectStacks {
        target: u32,
        effect: EffectDefId,
        count: u32,
    },
}

fn default_level() -> f32 {
    1.0
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario =
            ron::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse scenario RON: {}", e))?;
        if scenario.entities.is_empty() {
            anyhow::bail!("scenario {} spawns no entities", scenario.name);
        }
        Ok(scenario)
    }
}

/// Outcome of one scenario run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Report {
    pub scenario: String,
    pub steps: usize,
    pub applied: usize,
    pub rejected: usize,
    pub checks: usize,
    pub failures: Vec<String>,
    /// Hex SHA-256 of each entity's final server snapshot.
    pub digests: BTreeMap<u32, String>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Peer {
    server: AbilitySystemComponent,
    client: AbilitySystemComponent,
}

pub struct Runner {
    ctx: Arc<AbilitySystemContext>,
    attribute_sets: Vec<NumericAttributeSet>,
}

impl Runner {
    pub fn new(ctx: Arc<AbilitySystemContext>, attribute_sets: Vec<NumericAttributeSet>) -> Self {
        Self {
            ctx,
            attribute_sets,
        }
    }

    fn spawn(&self, id: u32, role: NetRole) -> AbilitySystemComponent {
        let mut asc = AbilitySystemComponent::new(Arc::clone(&self.ctx), EntityId(id), role);
        for set in &self.attribute_sets {
            asc.add_attribute_set(Box::new(set.clone()));
        }
        asc
    }

    pub fn run(&self, scenario: &Scenario) -> Result<Report> {
        let mut peers: BTreeMap<u32, Peer> = scenario
            .entities
            .iter()
            .map(|&id| {
                let peer = Peer {
                    server: self.spawn(id, NetRole::Authority),
                    client: self.spawn(id, NetRole::Client),
                };
                (id, peer)
            })
            .collect();
        let mut report = Report {
            scenario: scenario.name.clone(),
            ..Report::default()
        };

        for (index, step) in scenario.steps.iter().enumerate() {
            tracing::debug!(target: "gameplay::sim", index, step = ?step, "step");
            report.steps += 1;
            execute_step(&mut peers, step, &mut report)
                .with_context(|| format!("step {} ({:?})", index, step))?;
        }

        for (id, peer) in &peers {
            let digest = peer.server.snapshot().digest()?;
            report.digests.insert(*id, hex::encode(digest));
        }
        tracing::info!(
            target: "gameplay::sim",
            scenario = %report.scenario,
            steps = report.steps,
            failures = report.failures.len(),
            "scenario finished"
        );
        Ok(report)
    }
}

fn peer<'a>(peers: &'a mut BTreeMap<u32, Peer>, id: u32) -> Result<&'a mut Peer> {
    peers
        .get_mut(&id)
        .ok_or_else(|| anyhow::anyhow!("unknown entity {}", id))
}

fn record(report: &mut Report, outcome: Result<ApplyOutcome, gameplay_core::ApplyRejection>) {
    match outcome {
        Ok(outcome) => {
            report.applied += 1;
            tracing::debug!(target: "gameplay::sim", outcome = ?outcome, "applied");
        }
        Err(rejection) => {
            report.rejected += 1;
            tracing::info!(target: "gameplay::sim", reason = %rejection, "application rejected");
        }
    }
}

fn check(report: &mut Report, ok: bool, failure: impl FnOnce() -> String) {
    report.checks += 1;
    if !ok {
        let message = failure();
        tracing::warn!(target: "gameplay::sim", failure = %message, "expectation failed");
        report.failures.push(message);
    }
}

fn execute_step(peers: &mut BTreeMap<u32, Peer>, step: &Step, report: &mut Report) -> Result<()> {
    match step {
        Step::Apply {
            target,
            effect,
            level,
            source,
            set_by_caller,
        } => {
            let source = source.unwrap_or(*target);
            let mut spec = peer(peers, source)?
                .server
                .make_outgoing_spec(effect, *level)?;
            for (name, magnitude) in set_by_caller {
                spec.set_set_by_caller_magnitude(name.clone(), *magnitude);
            }
            let outcome = peer(peers, *target)?
                .server
                .apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE);
            record(report, outcome);
        }
        Step::Predict {
            target,
            effect,
            level,
            accept,
        } => {
            let peer = peer(peers, *target)?;
            let key = peer.client.next_prediction_key();
            let spec = peer.client.make_outgoing_spec(effect, *level)?;
            record(report, peer.client.apply_gameplay_effect_spec_to_self(spec, key));
            if *accept {
                let spec = peer.server.make_outgoing_spec(effect, *level)?;
                record(report, peer.server.apply_gameplay_effect_spec_to_self(spec, key));
                let bytes = peer.server.snapshot().encode()?;
                peer.client.receive_replication_bytes(&bytes)?;
            } else {
                peer.client.on_prediction_key_rejected(key);
            }
        }
        Step::Remove { target, effect } => {
            let removed = peer(peers, *target)?
                .server
                .remove_active_effects(&ActiveEffectQuery::of_effect(effect.clone()), -1);
            tracing::debug!(target: "gameplay::sim", effect = %effect, removed, "removed");
        }
        Step::AddTag { target, tag } => peer(peers, *target)?.server.add_loose_gameplay_tag(tag),
        Step::RemoveTag { target, tag } => {
            peer(peers, *target)?.server.remove_loose_gameplay_tag(tag)
        }
        Step::Tick(dt) => {
            for peer in peers.values_mut() {
                peer.server.tick(*dt);
                peer.client.tick(*dt);
            }
        }
        Step::Replicate => {
            for (id, peer) in peers.iter_mut() {
                let bytes = peer.server.snapshot().encode()?;
                peer.client.receive_replication_bytes(&bytes)?;
                for handle in peer.server.container().attribute_sets().handles() {
                    let server = peer.server.get_numeric_attribute(&handle);
                    let client = peer.client.get_numeric_attribute(&handle);
                    check(report, (server - client).abs() <= EPSILON, || {
                        format!("entity {id}: client {handle} = {client}, server has {server}")
                    });
                }
            }
        }
        Step::Expect {
            target,
            attribute,
            value,
            client,
        } => {
            let peer = peer(peers, *target)?;
            let asc = if *client { &peer.client } else { &peer.server };
            let actual = asc.get_numeric_attribute(attribute);
            check(report, (actual - value).abs() <= EPSILON, || {
                format!("entity {target}: {attribute} = {actual}, expected {value}")
            });
        }
        Step::ExpectTag {
            target,
            tag,
            present,
        } => {
            let actual = peer(peers, *target)?.server.has_matching_tag(tag);
            check(report, actual == *present, || {
                format!("entity {target}: tag {tag} present = {actual}, expected {present}")
            });
        }
        Step::ExpectStacks {
            target,
            effect,
            count,
        } => {
            let actual = peer(peers, *target)?.server.container().stack_count_of(effect);
            check(report, actual == *count, || {
                format!("entity {target}: {effect} has {actual} stacks, expected {count}")
            });
        }
    }
    Ok(())
}
