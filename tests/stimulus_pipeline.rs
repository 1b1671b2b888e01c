// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! CPU-side pipeline checks through the public API: building stimuli the
//! way an experiment would and verifying what the render loop would see.

use std::cell::RefCell;
use std::rc::Rc;

use psyvis::prelude::*;

fn grating_item() -> ItemHandle {
    let model = Rc::new(Model::new(Shape::Circle).unwrap());
    let texture = Rc::new(RefCell::new(
        Texture::new(TextureKind::Sine, Color::BLACK, Color::WHITE).unwrap(),
    ));
    Item::new(model, texture)
}

#[test]
fn alternating_forced_choice_setup() {
    // two alternatives on slots 0 and 1, a fixation cross always on
    let mut items = Items::new();
    let first = grating_item();
    let second = grating_item();
    let fixation = Item::new(
        Rc::new(Model::new(Shape::Cross).unwrap()),
        Rc::new(RefCell::new(Texture::flat(Color::WHITE))),
    );
    first.borrow_mut().show(0);
    second.borrow_mut().show(1);
    items.add(first.clone());
    items.add(second.clone());
    items.add(fixation.clone());

    let drawn_on = |slot: u32, items: &Items| -> usize {
        items
            .iter()
            .filter(|i| i.borrow().renders_in(Eye::Both, slot, ViewMode::Mono))
            .count()
    };
    assert_eq!(drawn_on(0, &items), 2);
    assert_eq!(drawn_on(1, &items), 2);
    assert!(!second.borrow().renders_in(Eye::Both, 0, ViewMode::Mono));
    assert!(!first.borrow().renders_in(Eye::Both, 1, ViewMode::Mono));
    assert!(fixation.borrow().renders_in(Eye::Both, 7, ViewMode::Mono));
}

#[test]
fn dichoptic_presentation_separates_eyes() {
    let left = grating_item();
    let right = grating_item();
    left.borrow_mut().set_eye(Eye::Left);
    right.borrow_mut().set_eye(Eye::Right);

    assert!(left.borrow().renders_in(Eye::Left, 0, ViewMode::Stereo));
    assert!(!left.borrow().renders_in(Eye::Right, 0, ViewMode::Stereo));
    assert!(right.borrow().renders_in(Eye::Right, 0, ViewMode::Stereo));
    assert!(!right.borrow().renders_in(Eye::Left, 0, ViewMode::Stereo));
}

#[test]
fn shared_texture_recolor_reaches_every_item() {
    let model = Rc::new(Model::new(Shape::Square).unwrap());
    let texture = Rc::new(RefCell::new(
        Texture::new(TextureKind::Checkerboard { cells: 4 }, Color::BLACK, Color::WHITE).unwrap(),
    ));
    let a = Item::new(model.clone(), texture.clone());
    let b = Item::new(model, texture.clone());

    texture.borrow_mut().set_colors(Color::RED, Color::GREEN);
    assert_eq!(a.borrow().texture().borrow().rgba0(), Color::RED);
    assert_eq!(b.borrow().texture().borrow().rgba1(), Color::GREEN);
    assert!(Rc::ptr_eq(a.borrow().texture(), b.borrow().texture()));
}

#[test]
fn engine_rejects_out_of_order_lifecycle() {
    let mut engine = Engine::new(EngineOptions::default()).unwrap();
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert!(matches!(
        engine.cleanup(),
        Err(EngineError::WrongState { .. })
    ));
}

#[test]
fn engine_options_validate_geometry() {
    let bad = EngineOptions {
        distance_mm: -10.0,
        ..EngineOptions::default()
    };
    assert!(Engine::new(bad).is_err());
    let bad = EngineOptions {
        slot_count: 0,
        ..EngineOptions::default()
    };
    assert!(Engine::new(bad).is_err());
}
