#![allow(dead_code)]

use ecm_framework::{Component, EcmManager, Layout, Tag};

pub const ENTITIES_SMALL: usize = 10_000;
pub const ENTITIES_MED: usize = 100_000;

#[derive(Default, Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
impl Component for Position {}

#[derive(Default, Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}
impl Component for Velocity {}

#[derive(Default, Clone, Copy)]
pub struct Wealth {
    pub value: f32,
}
impl Component for Wealth {}

pub struct Static;
impl Tag for Static {}

pub fn make_manager(workers: usize) -> EcmManager {
    let mut layout = Layout::new();
    layout.register_component::<Position>().unwrap();
    layout.register_component::<Velocity>().unwrap();
    layout.register_component::<Wealth>().unwrap();
    layout.register_tag::<Static>().unwrap();
    EcmManager::with_workers(layout, workers)
}

pub fn populate(manager: &mut EcmManager, count: usize) {
    for i in 0..count {
        let id = manager.add_entity();
        manager.add_component(id, Position { x: 0.0, y: 0.0 });
        manager.add_component(
            id,
            Velocity {
                dx: 1.0,
                dy: -1.0,
            },
        );
        manager.add_component(id, Wealth { value: 100.0 });
        if i % 8 == 0 {
            manager.add_tag::<Static>(id);
        }
    }
}
