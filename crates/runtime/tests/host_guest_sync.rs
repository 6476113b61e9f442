//! End-to-end host/guest sessions over the loopback transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use battle_content::{CreatureSpec, DelayedSpec, HeroSpec, Scenario, SideSpec};
use battle_core::{
    AbsoluteSide, BattleConfig, BattleOutcome, EntityRef, LogSeverity, Position, StatusEffectsManager, StatusKind,
    TargetCollector,
};
use runtime::events::StatusRecord;
use runtime::{
    BattleContext, BattleSession, EffectCategory, EffectModule, EffectRegistry, Event, HostHandle, LifecycleEvent,
    RecordingPresentation, Resolution, RuntimeConfig, RuntimeError, Topic, Trigger, UpdatePayload,
};

fn hero(position: Position, name: &str, hp: u32, creatures: &[(&str, u32)]) -> HeroSpec {
    HeroSpec {
        position,
        name: name.into(),
        hp,
        attack: 30,
        creatures: creatures
            .iter()
            .map(|(name, hp)| CreatureSpec {
                name: (*name).into(),
                hp: *hp,
                attack: 10,
            })
            .collect(),
        statuses: BTreeMap::new(),
    }
}

fn side(side: AbsoluteSide, heroes: Vec<HeroSpec>) -> SideSpec {
    SideSpec {
        side,
        heroes,
        graveyard: Vec::new(),
        permanent_artifacts: Vec::new(),
    }
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        battle: BattleConfig::new().with_seed(11).with_battle_speed(400),
        ..RuntimeConfig::default()
    }
}

/// Alice (two skeletons) and Cedric (holding a healing reserve) against
/// Bob and Dana. Two Guardian Shield stacks wait for battle start.
fn skirmish() -> Scenario {
    let mut cedric = hero(Position::Center, "Cedric", 380, &[]);
    cedric
        .statuses
        .insert(StatusKind::HealingReserve.as_str().to_owned(), 2);
    Scenario {
        name: "skirmish".into(),
        seed: Some(7),
        sides: vec![
            side(
                AbsoluteSide::Host,
                vec![
                    hero(Position::Left, "Alice", 420, &[("Skeleton", 40), ("Skeleton", 40)]),
                    cedric,
                ],
            ),
            side(
                AbsoluteSide::Guest,
                vec![
                    hero(Position::Left, "Bob", 450, &[]),
                    hero(Position::Right, "Dana", 360, &[]),
                ],
            ),
        ],
        delayed_effects: vec![DelayedSpec {
            side: AbsoluteSide::Host,
            effect_type: "shield_all_allies".into(),
            source: "Guardian Shield".into(),
            registrations: 2,
            params: BTreeMap::new(),
        }],
        triggers: Vec::new(),
    }
}

fn alice() -> EntityRef {
    EntityRef::hero(AbsoluteSide::Host, Position::Left)
}

fn skeleton(index: usize) -> EntityRef {
    EntityRef::creature(AbsoluteSide::Host, Position::Left, index)
}

fn bob() -> EntityRef {
    EntityRef::hero(AbsoluteSide::Guest, Position::Left)
}

/// Waits for the guest to catch up, then checks that both peers hold the
/// same replicated state and wrote the same combat log.
async fn assert_mirrored(session: &BattleSession, host: &HostHandle) {
    session.settle().await.unwrap();
    let host_state = host.query_state().await.unwrap();
    let guest_state = session.guest().query_state().await.unwrap();
    assert_eq!(host_state.log().entries(), guest_state.log().entries());
    assert_eq!(
        host.fingerprint().await.unwrap(),
        session.guest().fingerprint().await.unwrap()
    );
}

/// Hexes every enemy hero twice, then fails; the reduced path hexes once.
struct Hex;

impl Hex {
    fn mark(
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
        stacks: u32,
    ) -> runtime::Result<UpdatePayload> {
        let mut records = Vec::with_capacity(targets.len());
        for &target in targets {
            let final_stacks = ctx.apply_status(target, "hexed", stacks)?;
            records.push(StatusRecord {
                target,
                status: "hexed".into(),
                stacks,
                resisted: false,
                final_stacks,
            });
        }
        Ok(UpdatePayload::StatusApplied {
            effect: "hex".into(),
            caster: trigger.caster(),
            targets: records,
        })
    }
}

#[async_trait]
impl EffectModule for Hex {
    fn name(&self) -> &'static str {
        "hex"
    }

    fn display_name(&self) -> &'static str {
        "Hex"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Spell
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::enemy_heroes_only(ctx.state(), trigger.side())
    }

    fn apply(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> runtime::Result<UpdatePayload> {
        Self::mark(ctx, trigger, targets, 2)?;
        Err(RuntimeError::MissingCaster { effect: "hex" })
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> runtime::Result<Option<UpdatePayload>> {
        Self::mark(ctx, trigger, targets, 1).map(Some)
    }

    async fn play(&self, ctx: &mut BattleContext, _: &UpdatePayload) {
        ctx.add_combat_log("Hex lands.", LogSeverity::Info);
    }
}

#[tokio::test(start_paused = true)]
async fn guest_mirror_converges_with_host() {
    let guest_view = RecordingPresentation::new();
    let session = BattleSession::builder()
        .config(config())
        .scenario(skirmish())
        .guest_presentation(Arc::new(guest_view.clone()))
        .build()
        .await
        .unwrap();
    let host = session.host();

    let started = host.start_battle().await.unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].resolution, Resolution::Applied);

    let poison = host.trigger("poison_vial", alice()).await.unwrap();
    assert_eq!(poison.targets_affected, 2);

    host.trigger("skeleton_rally", skeleton(0)).await.unwrap();
    host.trigger("cannon_burst", skeleton(1)).await.unwrap();

    // Nobody is wounded yet: shields took nothing from Cedric's side.
    let reserve = host
        .trigger("healing_reserve", EntityRef::hero(AbsoluteSide::Host, Position::Center))
        .await
        .unwrap();
    assert!(reserve.fizzled());

    let replayed = session.settle().await.unwrap();
    assert_eq!(replayed, 5);

    let host_print = host.fingerprint().await.unwrap();
    let guest_print = session.guest().fingerprint().await.unwrap();
    assert_eq!(host_print, guest_print);

    let mirror = session.guest().query_state().await.unwrap();
    let alice_mirror = mirror.combatant(alice()).unwrap();
    assert_eq!(alice_mirror.shield(), 80);
    assert_eq!(alice_mirror.battle_attack_bonus(), 10);
    assert_eq!(alice_mirror.attack(), 40);
    assert_eq!(mirror.combatant(bob()).unwrap().current_hp(), 330);
    assert_eq!(
        StatusEffectsManager::get_status_effect_stacks(&mirror, bob(), StatusKind::Poisoned.as_str()),
        1
    );

    let log = mirror.log();
    assert!(log.contains("Guardian Shield grants 80 shield to 4 allies."));
    assert!(log.contains("2 enemies poisoned."));
    assert!(log.contains("Skeleton rallies the bones: 2 heroes gain +10 attack!"));
    assert!(log.contains("Cannon Burst hits Bob for 120 damage."));
    assert!(log.contains("Healing Reserve fizzles: no wounded ally."));
    assert!(!guest_view.played().is_empty());
    assert_mirrored(&session, &host).await;

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lethal_hit_ends_battle_on_both_peers() {
    let mut scenario = skirmish();
    scenario.sides[1].heroes = vec![hero(Position::Left, "Bob", 100, &[])];
    let session = BattleSession::builder()
        .config(config())
        .scenario(scenario)
        .build()
        .await
        .unwrap();
    let host = session.host();
    let mut guest_lifecycle = session.guest().subscribe(Topic::Lifecycle);

    let outcome = host.trigger("cannon_burst", skeleton(0)).await.unwrap();
    assert_eq!(outcome.resolution, Resolution::Applied);
    session.settle().await.unwrap();

    let ended = guest_lifecycle.recv().await.unwrap();
    assert!(matches!(
        ended,
        Event::Lifecycle(LifecycleEvent::BattleEnded {
            peer: AbsoluteSide::Guest,
            outcome: BattleOutcome::Victory(AbsoluteSide::Host),
        })
    ));

    let host_state = host.query_state().await.unwrap();
    let guest_state = session.guest().query_state().await.unwrap();
    // Identical up to the closing line, which reads from each viewer's side.
    let (host_end, host_lines) = host_state.log().entries().split_last().unwrap();
    let (guest_end, guest_lines) = guest_state.log().entries().split_last().unwrap();
    assert_eq!(host_lines, guest_lines);
    assert_eq!(host_end.message, "Victory! The battle is won.");
    assert_eq!(guest_end.message, "Defeat. The battle is lost.");
    // Battle-scoped statuses are wiped on both sides.
    let reserve = StatusKind::HealingReserve.as_str();
    let cedric = EntityRef::hero(AbsoluteSide::Host, Position::Center);
    assert_eq!(StatusEffectsManager::get_status_effect_stacks(&guest_state, cedric, reserve), 0);
    assert_eq!(
        host.fingerprint().await.unwrap(),
        session.guest().fingerprint().await.unwrap()
    );

    let late = host.trigger("poison_vial", alice()).await.unwrap();
    assert_eq!(late.resolution, Resolution::BattleOver);
    assert!(late.payload.is_none());

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disenchanted_shields_accumulate_until_battle_start() {
    let mut scenario = skirmish();
    scenario.delayed_effects.clear();
    let session = BattleSession::builder()
        .config(config())
        .scenario(scenario)
        .build()
        .await
        .unwrap();
    let host = session.host();

    assert_eq!(host.disenchant_guardian_shield(AbsoluteSide::Guest).await.unwrap(), 1);
    assert_eq!(host.disenchant_guardian_shield(AbsoluteSide::Guest).await.unwrap(), 2);

    let started = host.start_battle().await.unwrap();
    assert_eq!(started.len(), 1);
    match &started[0].payload {
        Some(UpdatePayload::ShieldGranted {
            side, total_shield, grants, ..
        }) => {
            assert_eq!(*side, AbsoluteSide::Guest);
            assert_eq!(*total_shield, 80);
            assert_eq!(grants.len(), 2);
        }
        other => panic!("unexpected payload: {other:?}"),
    }

    // The registry was reset; a second start resolves nothing.
    assert!(host.start_battle().await.unwrap().is_empty());

    session.settle().await.unwrap();
    let mirror = session.guest().query_state().await.unwrap();
    assert_eq!(mirror.combatant(bob()).unwrap().shield(), 80);
    assert_mirrored(&session, &host).await;

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cast_from_an_empty_slot_fizzles_on_both_peers() {
    let session = BattleSession::builder()
        .config(config())
        .scenario(skirmish())
        .build()
        .await
        .unwrap();
    let host = session.host();

    let empty_slot = EntityRef::hero(AbsoluteSide::Host, Position::Right);
    let outcome = host.trigger("poison_vial", empty_slot).await.unwrap();
    assert_eq!(
        outcome.resolution,
        Resolution::Fizzled {
            reason: "caster not found".into()
        }
    );
    assert_eq!(host.last_sent().await.unwrap(), 1);

    assert_mirrored(&session, &host).await;
    let mirror = session.guest().query_state().await.unwrap();
    assert!(mirror.log().contains("Poison Vial fizzles: caster not found."));
    assert_eq!(
        StatusEffectsManager::get_status_effect_stacks(&mirror, bob(), StatusKind::Poisoned.as_str()),
        0
    );

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fallen_hero_cannot_drink_on_either_peer() {
    let mut scenario = skirmish();
    scenario.delayed_effects.clear();
    scenario.sides[0].heroes[0].hp = 100;
    scenario.sides[1].heroes[0] = hero(Position::Left, "Bob", 450, &[("Cannon", 60)]);
    let session = BattleSession::builder()
        .config(config())
        .scenario(scenario)
        .build()
        .await
        .unwrap();
    let host = session.host();

    let cannon = EntityRef::creature(AbsoluteSide::Guest, Position::Left, 0);
    host.trigger("cannon_burst", cannon).await.unwrap();
    let state = host.query_state().await.unwrap();
    assert!(!state.combatant(alice()).unwrap().is_alive());
    assert!(!state.outcome().is_finished());

    let outcome = host.trigger("poison_vial", alice()).await.unwrap();
    assert_eq!(
        outcome.resolution,
        Resolution::Fizzled {
            reason: "caster is no longer alive".into()
        }
    );

    assert_mirrored(&session, &host).await;
    let mirror = session.guest().query_state().await.unwrap();
    assert!(mirror.log().contains("Alice is defeated!"));
    assert!(mirror.log().contains("Poison Vial fizzles: caster is no longer alive."));
    assert_eq!(
        StatusEffectsManager::get_status_effect_stacks(&mirror, bob(), StatusKind::Poisoned.as_str()),
        0
    );

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn misfire_replays_the_reduced_path_on_the_guest() {
    let mut effects = EffectRegistry::standard();
    effects.register(Hex);
    let session = BattleSession::builder()
        .config(config())
        .effects(effects)
        .scenario(skirmish())
        .build()
        .await
        .unwrap();
    let host = session.host();

    let outcome = host.trigger("hex", alice()).await.unwrap();
    assert_eq!(outcome.resolution, Resolution::Fallback);
    assert!(matches!(outcome.payload, Some(UpdatePayload::Misfired { .. })));

    assert_mirrored(&session, &host).await;
    let mirror = session.guest().query_state().await.unwrap();
    assert_eq!(StatusEffectsManager::get_status_effect_stacks(&mirror, bob(), "hexed"), 1);
    assert!(mirror.log().contains("Hex misfired; only its core effect was applied."));
    assert!(!mirror.log().contains("Hex lands."));

    drop(host);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unknown_effect_is_reported_to_the_caller() {
    let session = BattleSession::builder()
        .config(config())
        .scenario(skirmish())
        .build()
        .await
        .unwrap();

    let error = session.host().trigger("meteor", alice()).await.unwrap_err();
    assert!(matches!(error, RuntimeError::UnknownEffect { .. }));
    assert_eq!(session.host().last_sent().await.unwrap(), 0);

    session.shutdown().await.unwrap();
}
