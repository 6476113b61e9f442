use super::{MutationError, ensure_authoritative};
use crate::state::{BattleState, Combatant, EntityRef, StatusKind};

fn living_mut(state: &mut BattleState, target: EntityRef) -> Result<&mut Combatant, MutationError> {
    let combatant = state.resolve_mut(target)?;
    if combatant.is_alive() {
        Ok(combatant)
    } else {
        Err(MutationError::TargetDead { target })
    }
}

/// Restores up to `amount` HP, capped at max HP. Returns the HP actually
/// restored, which is 0 while the target carries `heal_block`.
pub fn heal(state: &mut BattleState, target: EntityRef, amount: u32) -> Result<u32, MutationError> {
    ensure_authoritative(state, "heal")?;
    let combatant = living_mut(state, target)?;
    if combatant.statuses().get(StatusKind::HealBlock.as_ref()) > 0 {
        return Ok(0);
    }
    let before = combatant.current_hp();
    combatant.write_hp(before.saturating_add(amount));
    Ok(combatant.current_hp() - before)
}

/// Adds to the shield pool. Returns the new shield.
pub fn add_shield(state: &mut BattleState, target: EntityRef, amount: u32) -> Result<u32, MutationError> {
    ensure_authoritative(state, "add_shield")?;
    let combatant = living_mut(state, target)?;
    let shield = combatant.shield().saturating_add(amount);
    combatant.write_shield(shield);
    Ok(shield)
}

/// Adds to this battle's attack bonus. Returns the new bonus.
pub fn add_attack_bonus(state: &mut BattleState, target: EntityRef, amount: i32) -> Result<i32, MutationError> {
    ensure_authoritative(state, "add_attack_bonus")?;
    let combatant = living_mut(state, target)?;
    let bonus = combatant.battle_attack_bonus().saturating_add(amount);
    combatant.write_attack_bonus(bonus);
    Ok(bonus)
}

/// Raises max and current HP for this battle. Returns the new max HP.
pub fn add_hp_bonus(state: &mut BattleState, target: EntityRef, amount: i32) -> Result<u32, MutationError> {
    ensure_authoritative(state, "add_hp_bonus")?;
    let combatant = living_mut(state, target)?;
    combatant.grow_hp(amount);
    Ok(combatant.max_hp())
}

/// Forces a host-computed HP value. Dropping to 0 kills the target and
/// clears its statuses, mirroring the host-side death path.
pub fn set_hp(state: &mut BattleState, target: EntityRef, hp: u32) -> Result<(), MutationError> {
    let combatant = state.resolve_mut(target)?;
    combatant.write_hp(hp);
    if !combatant.is_alive() {
        combatant.statuses_mut().clear();
    }
    Ok(())
}

pub fn set_shield(state: &mut BattleState, target: EntityRef, shield: u32) -> Result<(), MutationError> {
    state.resolve_mut(target)?.write_shield(shield);
    Ok(())
}

pub fn set_attack_bonus(state: &mut BattleState, target: EntityRef, bonus: i32) -> Result<(), MutationError> {
    state.resolve_mut(target)?.write_attack_bonus(bonus);
    Ok(())
}
