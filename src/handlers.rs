//! Per-icon event handlers.
//!
//! Handlers are taken out of the table while they run, so they may install
//! new handlers or drop their own icon without tripping a `RefCell` borrow.

use std::cell::RefCell;

use crate::menu::Command;

pub(crate) type Callback = Box<dyn FnMut()>;
pub(crate) type CommandSink = Box<dyn FnMut(&Command)>;

#[derive(Default)]
pub(crate) struct Handlers {
    pub clicked: Option<Callback>,
    pub menu_opening: Option<Callback>,
    pub target: Option<CommandSink>,
}

pub(crate) type Slot<H> = fn(&mut Handlers) -> &mut Option<H>;

pub(crate) fn clicked(h: &mut Handlers) -> &mut Option<Callback> {
    &mut h.clicked
}

pub(crate) fn menu_opening(h: &mut Handlers) -> &mut Option<Callback> {
    &mut h.menu_opening
}

pub(crate) fn target(h: &mut Handlers) -> &mut Option<CommandSink> {
    &mut h.target
}

/// Handlers keyed by icon id.
pub(crate) struct HandlerTable {
    entries: RefCell<Vec<(u32, Handlers)>>,
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn insert(&self, id: u32, handlers: Handlers) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|(i, _)| *i != id);
        entries.push((id, handlers));
    }

    pub fn remove(&self, id: u32) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(i, _)| *i != id);
        entries.len() != before
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.borrow().iter().any(|(i, _)| *i == id)
    }

    pub fn set<H>(&self, id: u32, slot: Slot<H>, handler: H) {
        if let Some((_, h)) = self.entries.borrow_mut().iter_mut().find(|(i, _)| *i == id) {
            *slot(h) = Some(handler);
        }
    }

    /// Runs the handler in `slot` for `id` with no borrow held. Returns
    /// whether a handler ran.
    ///
    /// Afterwards the handler goes back into its slot unless the slot was
    /// filled during the call, or the id was removed.
    pub fn call<H>(&self, id: u32, slot: Slot<H>, f: impl FnOnce(&mut H)) -> bool {
        let taken = self
            .entries
            .borrow_mut()
            .iter_mut()
            .find(|(i, _)| *i == id)
            .and_then(|(_, h)| slot(h).take());
        let Some(mut handler) = taken else {
            return false;
        };
        f(&mut handler);
        if let Some((_, h)) = self.entries.borrow_mut().iter_mut().find(|(i, _)| *i == id) {
            let s = slot(h);
            if s.is_none() {
                *s = Some(handler);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    thread_local! {
        static TABLE: HandlerTable = const { HandlerTable::new() };
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    #[test]
    fn handler_replacing_itself_keeps_the_replacement() {
        let (old_runs, old_seen) = counter();
        let (new_runs, new_seen) = counter();
        TABLE.with(|t| {
            t.insert(1, Handlers::default());
            t.set(
                1,
                clicked,
                Box::new(move || {
                    old_runs.set(old_runs.get() + 1);
                    let new_runs = new_runs.clone();
                    TABLE.with(|t| {
                        t.set(1, clicked, Box::new(move || new_runs.set(new_runs.get() + 1)))
                    });
                }) as Callback,
            );

            assert!(t.call(1, clicked, |f| f()));
            assert!(t.call(1, clicked, |f| f()));
            assert!(t.call(1, clicked, |f| f()));
        });
        assert_eq!(old_seen.get(), 1);
        assert_eq!(new_seen.get(), 2);
    }

    #[test]
    fn handler_survives_its_own_call() {
        let (runs, seen) = counter();
        let table = HandlerTable::new();
        table.insert(3, Handlers::default());
        table.set(3, menu_opening, Box::new(move || runs.set(runs.get() + 1)) as Callback);
        assert!(table.call(3, menu_opening, |f| f()));
        assert!(table.call(3, menu_opening, |f| f()));
        assert_eq!(seen.get(), 2);
        // Other slots stay empty.
        assert!(!table.call(3, clicked, |f| f()));
    }

    #[test]
    fn removal_during_call_is_final() {
        TABLE.with(|t| {
            t.insert(7, Handlers::default());
            t.set(
                7,
                target,
                Box::new(|_: &Command| {
                    TABLE.with(|t| assert!(t.remove(7)));
                }) as CommandSink,
            );
            assert!(t.call(7, target, |sink| sink(&Command::new("quit"))));
            assert!(!t.contains(7));
            assert!(!t.call(7, target, |sink| sink(&Command::new("quit"))));
        });
    }

    #[test]
    fn unknown_id_runs_nothing() {
        let table = HandlerTable::new();
        assert!(!table.call(42, clicked, |f| f()));
        table.set(42, clicked, Box::new(|| {}) as Callback);
        assert!(!table.contains(42));
    }
}
