//! Rewind history driving a real machine: bank switches, RAM writes and
//! quick saves interleaved with rewinds.

use vcs_core::cart::{self, CartKind};
use vcs_core::savestate;
use vcs_core::{RewindManager, StateManager, Vcs};

/// 16-bank F9 image; byte 0 of every bank holds the bank number.
fn f9_vcs() -> Vcs {
    let image: Vec<u8> = (0..16 * 4096).map(|i| if i % 4096 == 0 { (i / 4096) as u8 } else { 0xEA }).collect();
    let mut vcs = Vcs::from_image(image, Some(CartKind::F9)).unwrap();
    vcs.reset();
    vcs
}

/// Frame `n` of a toy program: select bank `n % 16`, count frames in RAM.
fn play_frame(vcs: &mut Vcs, n: u8) {
    vcs.poke(0x1FF9, n % 16);
    vcs.poke(0x0080, n);
    vcs.run_frame();
}

#[test]
fn test_rewind_restores_bank_and_ram() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    for n in 1..=30u8 {
        play_frame(&mut vcs, n);
        assert!(rm.add_state(&mut vcs, "frame"));
    }
    assert_eq!(vcs.peek(0x1000), 30 % 16);

    for expected in (25..30u8).rev() {
        assert!(rm.rewind_debugger_state(&mut vcs));
        assert_eq!(vcs.peek(0x0080), expected);
        assert_eq!(vcs.cart.get_bank(), (expected % 16) as u16);
        assert_eq!(vcs.peek(0x1000), expected % 16);
    }

    assert!(rm.unwind_debugger_state(&mut vcs));
    assert_eq!(vcs.peek(0x0080), 26);
}

#[test]
fn test_emulation_rewind_jumps_back_in_time() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    for n in 0..200u32 {
        play_frame(&mut vcs, n as u8);
        rm.add_state(&mut vcs, "frame");
    }
    let before = vcs.frame_count();
    assert!(rm.rewind_emulation_state(&mut vcs));
    let jumped = before - vcs.frame_count();
    assert!(jumped >= 45, "coarse rewind moved only {} frames", jumped);
    assert!(rm.last_message().unwrap().starts_with("Rewind"));
    assert!(rm.len() <= rm.max_size());
}

#[test]
fn test_new_branch_after_rewind() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    for n in 1..=10u8 {
        play_frame(&mut vcs, n);
        rm.add_state(&mut vcs, "frame");
    }
    for _ in 0..4 {
        rm.rewind_debugger_state(&mut vcs);
    }
    assert_eq!(vcs.peek(0x0080), 6);

    play_frame(&mut vcs, 100);
    rm.add_state(&mut vcs, "branch");
    assert_eq!(rm.len(), 7);
    assert!(!rm.unwind_debugger_state(&mut vcs));

    rm.rewind_debugger_state(&mut vcs);
    assert_eq!(vcs.peek(0x0080), 6);
    rm.unwind_debugger_state(&mut vcs);
    assert_eq!(vcs.peek(0x0080), 100);
    assert_eq!(vcs.cart.get_bank(), 100 % 16);
}

#[test]
fn test_forced_bank_survives_rewind_lock() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    play_frame(&mut vcs, 2);
    rm.add_state(&mut vcs, "frame");
    play_frame(&mut vcs, 9);
    rm.add_state(&mut vcs, "frame");

    vcs_core::debugger::force_bank(vcs.cart.as_mut(), &mut vcs.system, 5);
    // Restoring state is not a program-driven switch: it applies even when locked
    assert!(rm.rewind_debugger_state(&mut vcs));
    assert_eq!(vcs.cart.get_bank(), 2);
    assert!(vcs.cart.bank_locked());
}

#[test]
fn test_quick_save_and_rewind_agree() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    for n in 1..=5u8 {
        play_frame(&mut vcs, n);
        rm.add_state(&mut vcs, "frame");
    }
    let saved = savestate::capture(&mut vcs).unwrap();

    for n in 6..=8u8 {
        play_frame(&mut vcs, n);
        rm.add_state(&mut vcs, "frame");
    }
    savestate::restore(&mut vcs, &saved).unwrap();
    assert_eq!(vcs.frame_count(), 5);
    assert_eq!(vcs.peek(0x0080), 5);

    // History still holds the abandoned frames until the next add
    assert!(rm.rewind_debugger_state(&mut vcs));
    assert_eq!(vcs.peek(0x0080), 4);
}

#[test]
fn test_refused_rewind_leaves_machine_untouched() {
    let mut vcs = f9_vcs();
    let mut rm = RewindManager::default();
    for n in 1..=2u8 {
        play_frame(&mut vcs, n);
        rm.add_state(&mut vcs, "frame");
    }
    play_frame(&mut vcs, 3);

    // History was recorded with an F9 board; an F8 refuses those records
    vcs.cart = cart::create(vec![0; 8192], Some(CartKind::F8)).unwrap();
    vcs.cart.install(&mut vcs.system);
    let cycles = vcs.cycles();

    assert!(!rm.rewind_state(&mut vcs, false));
    assert_eq!(vcs.cycles(), cycles);
    assert_eq!(vcs.frame_count(), 3);
    assert_eq!(vcs.peek(0x0080), 3);
    assert_eq!(vcs.cart.get_bank(), 1);
}
