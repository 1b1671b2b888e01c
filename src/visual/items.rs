// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use crate::visual::item::ItemHandle;

/// Insertion-ordered registry of the items the render loop draws.
///
/// Holds shared handles, so the same item may appear more than once and
/// removal is by handle identity, not by value.
#[derive(Default)]
pub struct Items {
    items: Vec<ItemHandle>,
}

impl Items {
    pub fn new() -> Items {
        Items::default()
    }

    pub fn add(&mut self, item: ItemHandle) {
        self.items.push(item);
    }

    /// Removes the first entry holding the same item. Returns whether
    /// anything was removed.
    pub fn remove(&mut self, item: &ItemHandle) -> bool {
        match self.items.iter().position(|i| Rc::ptr_eq(i, item)) {
            Some(at) => {
                self.items.remove(at);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&ItemHandle> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemHandle> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::color::Color;
    use crate::visual::item::Item;
    use crate::visual::model::{Model, Shape};
    use crate::visual::texture::Texture;
    use std::cell::RefCell;

    fn handle() -> ItemHandle {
        let model = Rc::new(Model::new(Shape::Circle).unwrap());
        let texture = Rc::new(RefCell::new(Texture::flat(Color::WHITE)));
        Item::new(model, texture)
    }

    #[test]
    fn removal_is_by_identity() {
        let mut items = Items::new();
        let a = handle();
        let b = handle();
        items.add(a.clone());
        items.add(b.clone());
        assert_eq!(items.len(), 2);
        assert!(items.remove(&a));
        assert!(!items.remove(&a));
        assert_eq!(items.len(), 1);
        assert!(Rc::ptr_eq(items.get(0).unwrap(), &b));
    }

    #[test]
    fn duplicates_are_allowed_and_removed_one_at_a_time() {
        let mut items = Items::new();
        let a = handle();
        items.add(a.clone());
        items.add(a.clone());
        assert_eq!(items.len(), 2);
        assert!(items.remove(&a));
        assert_eq!(items.len(), 1);
        assert!(items.remove(&a));
        assert!(items.is_empty());
    }
}
