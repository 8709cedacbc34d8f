//! # Commands
//!
//! A command is a typed name. Handlers registered for it run inside an
//! update, highest priority first, until one returns `true`.
//!
//! ```text
//! Critical(4) → High(3) → Normal(2) → Low(1) → Editor(0)
//! ```

use crate::listeners::{ListenerSet, Unsubscribe};
use crate::node::TextFormat;
use crate::update::UpdateContext;
use crate::EditorResult;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// A command carrying a payload of type `P`. Commands are identified by name.
pub struct Command<P> {
    name: &'static str,
    _payload: PhantomData<fn(P)>,
}

impl<P> Command<P> {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P> Clone for Command<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Command<P> {}

impl<P> fmt::Debug for Command<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.name)
    }
}

pub const fn create_command<P>(name: &'static str) -> Command<P> {
    Command {
        name,
        _payload: PhantomData,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl CommandPriority {
    const DESCENDING: [CommandPriority; 5] = [
        CommandPriority::Critical,
        CommandPriority::High,
        CommandPriority::Normal,
        CommandPriority::Low,
        CommandPriority::Editor,
    ];
}

pub const SELECTION_CHANGE_COMMAND: Command<()> = create_command("SELECTION_CHANGE_COMMAND");
/// Text typed by the user, inserted at the selection.
pub const CONTROLLED_TEXT_INSERTION_COMMAND: Command<String> =
    create_command("CONTROLLED_TEXT_INSERTION_COMMAND");
pub const INSERT_PARAGRAPH_COMMAND: Command<()> = create_command("INSERT_PARAGRAPH_COMMAND");
/// Payload: keep the caret before the break.
pub const INSERT_LINE_BREAK_COMMAND: Command<bool> = create_command("INSERT_LINE_BREAK_COMMAND");
/// Payload: delete backward.
pub const DELETE_CHARACTER_COMMAND: Command<bool> = create_command("DELETE_CHARACTER_COMMAND");
pub const REMOVE_TEXT_COMMAND: Command<()> = create_command("REMOVE_TEXT_COMMAND");
pub const FORMAT_TEXT_COMMAND: Command<TextFormat> = create_command("FORMAT_TEXT_COMMAND");
pub const UNDO_COMMAND: Command<()> = create_command("UNDO_COMMAND");
pub const REDO_COMMAND: Command<()> = create_command("REDO_COMMAND");
pub const CAN_UNDO_COMMAND: Command<bool> = create_command("CAN_UNDO_COMMAND");
pub const CAN_REDO_COMMAND: Command<bool> = create_command("CAN_REDO_COMMAND");
pub const FOCUS_COMMAND: Command<()> = create_command("FOCUS_COMMAND");
pub const BLUR_COMMAND: Command<()> = create_command("BLUR_COMMAND");

pub(crate) type ErasedHandler = dyn Fn(&dyn Any, &mut UpdateContext<'_>) -> EditorResult<bool>;

type PrioritySets = [ListenerSet<ErasedHandler>; 5];

#[derive(Default)]
pub(crate) struct CommandRegistry {
    handlers: RefCell<HashMap<&'static str, Rc<PrioritySets>>>,
}

impl CommandRegistry {
    pub(crate) fn register<P: 'static>(
        &self,
        command: &Command<P>,
        priority: CommandPriority,
        handler: impl Fn(&P, &mut UpdateContext<'_>) -> EditorResult<bool> + 'static,
    ) -> Unsubscribe {
        let sets = self
            .handlers
            .borrow_mut()
            .entry(command.name)
            .or_default()
            .clone();
        let name = command.name;
        let erased: Rc<ErasedHandler> = Rc::new(
            move |payload: &dyn Any, ctx: &mut UpdateContext<'_>| match payload.downcast_ref::<P>() {
                Some(payload) => handler(payload, ctx),
                None => {
                    tracing::warn!(command = name, "payload type mismatch");
                    Ok(false)
                }
            },
        );
        sets[priority as usize].add(erased)
    }

    /// Handlers for `name`, highest priority first.
    pub(crate) fn handlers(&self, name: &str) -> Vec<Rc<ErasedHandler>> {
        let Some(sets) = self.handlers.borrow().get(name).cloned() else {
            return Vec::new();
        };
        CommandPriority::DESCENDING
            .iter()
            .flat_map(|priority| sets[*priority as usize].snapshot())
            .collect()
    }
}

impl UpdateContext<'_> {
    /// Run the handlers for `command` inside this update.
    pub fn dispatch_command<P: 'static>(
        &mut self,
        command: &Command<P>,
        payload: P,
    ) -> EditorResult<bool> {
        let handlers = self.editor.inner.commands.handlers(command.name());
        tracing::trace!(command = command.name(), handlers = handlers.len(), "dispatch");
        for handler in handlers {
            if handler(&payload, self)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
