//! # Editor Handle
//!
//! [`Editor`] is a cheap `Rc` handle over the engine's interior state. It
//! owns the current [`EditorState`], the pending state of an in-flight batch,
//! the registries and the attachment to a DOM root.
//!
//! ## Lifecycle
//!
//! ```text
//! build → set_root_element → update* → flush → listeners
//!                               ↑                  │
//!                               └── queued ────────┘
//! ```
//!
//! The handle is `!Send`. Everything runs on the thread that owns the DOM.

use crate::commands::{Command, CommandPriority, CommandRegistry, BLUR_COMMAND, FOCUS_COMMAND};
use crate::commit;
use crate::config::{EditorConfig, Theme};
use crate::listeners::{
    DecoratorListener, EditableListener, Listeners, MutationListener, RootListener,
    TextContentListener, Unsubscribe, UpdateListener,
};
use crate::mutations::NodeMutation;
use crate::node::{NodeBehavior, NodeRegistry};
use crate::read::StateRead;
use crate::reconciler::{DomKeyMap, Reconciler};
use crate::state::EditorState;
use crate::transforms::{NodeTransform, TransformRegistry};
use crate::update::{run_update, PendingState, UpdateContext, UpdateFn, UpdateOptions};
use crate::{EditorError, EditorResult, NodeKey};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, error, info};
use weft_dom::{DomNodeId, SharedDocument};

/// Receives pipeline errors before they are returned to the caller.
pub type ErrorHandler = dyn Fn(&EditorError, &Editor);

pub(crate) struct EditorInner {
    pub(crate) config: EditorConfig,
    pub(crate) registry: Arc<NodeRegistry>,
    pub(crate) current: RefCell<EditorState>,
    pub(crate) pending: RefCell<Option<PendingState>>,
    pub(crate) updating: Cell<bool>,
    pub(crate) flushing_dom: Cell<bool>,
    pub(crate) queue: RefCell<VecDeque<(UpdateFn, UpdateOptions)>>,
    /// `on_update` callbacks waiting for the next commit.
    pub(crate) deferred: RefCell<Vec<Box<dyn FnOnce()>>>,
    pub(crate) version: Cell<u64>,
    pub(crate) composition_key: Cell<Option<NodeKey>>,
    pub(crate) editable: Cell<bool>,
    pub(crate) root: RefCell<Option<(SharedDocument, DomNodeId)>>,
    pub(crate) dom_map: RefCell<DomKeyMap>,
    pub(crate) decorators: RefCell<BTreeMap<NodeKey, Value>>,
    pub(crate) listeners: Listeners,
    pub(crate) commands: CommandRegistry,
    pub(crate) transforms: TransformRegistry,
    pub(crate) on_error: Option<Rc<ErrorHandler>>,
}

impl EditorInner {
    fn new(
        config: EditorConfig,
        registry: Arc<NodeRegistry>,
        state: EditorState,
        on_error: Option<Rc<ErrorHandler>>,
    ) -> Self {
        let editable = config.editable;
        let decorators = commit::all_decorators(&state);
        Self {
            config,
            registry,
            current: RefCell::new(state),
            pending: RefCell::new(None),
            updating: Cell::new(false),
            flushing_dom: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
            deferred: RefCell::new(Vec::new()),
            version: Cell::new(0),
            composition_key: Cell::new(None),
            editable: Cell::new(editable),
            root: RefCell::new(None),
            dom_map: RefCell::new(DomKeyMap::default()),
            decorators: RefCell::new(decorators),
            listeners: Listeners::default(),
            commands: CommandRegistry::default(),
            transforms: TransformRegistry::default(),
            on_error,
        }
    }
}

/// Sets a flag for as long as the scope lives. Dropping restores the
/// previous value, unwinding included.
pub(crate) struct FlagScope<'a> {
    flag: &'a Cell<bool>,
    prev: bool,
}

impl<'a> FlagScope<'a> {
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Self {
        let prev = flag.replace(true);
        Self { flag, prev }
    }
}

impl Drop for FlagScope<'_> {
    fn drop(&mut self) {
        self.flag.set(self.prev);
    }
}

#[derive(Clone)]
pub struct Editor {
    pub(crate) inner: Rc<EditorInner>,
}

/// A handle that does not keep the editor alive. Listeners that need the
/// editor should hold one of these.
#[derive(Clone)]
pub struct WeakEditor(Weak<EditorInner>);

impl WeakEditor {
    pub fn upgrade(&self) -> Option<Editor> {
        self.0.upgrade().map(|inner| Editor { inner })
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("namespace", &self.inner.config.namespace)
            .field("version", &self.inner.version.get())
            .field("updating", &self.inner.updating.get())
            .finish()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures and creates an [`Editor`].
pub struct EditorBuilder {
    config: EditorConfig,
    registry: NodeRegistry,
    on_error: Option<Rc<ErrorHandler>>,
    initial_state: Option<String>,
}

impl Default for EditorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            registry: NodeRegistry::with_builtins(),
            on_error: None,
            initial_state: None,
        }
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.config.editable = editable;
        self
    }

    /// Add a node type. Fails if the type name is taken.
    pub fn register_node(mut self, behavior: Arc<dyn NodeBehavior>) -> EditorResult<Self> {
        self.registry.register(behavior)?;
        Ok(self)
    }

    pub fn on_error(mut self, handler: impl Fn(&EditorError, &Editor) + 'static) -> Self {
        self.on_error = Some(Rc::new(handler));
        self
    }

    /// Serialized state the editor starts from.
    pub fn initial_state(mut self, json: impl Into<String>) -> Self {
        self.initial_state = Some(json.into());
        self
    }

    pub fn build(self) -> EditorResult<Editor> {
        let registry = Arc::new(self.registry);
        let state = match &self.initial_state {
            Some(json) => EditorState::from_json_str(registry.clone(), json)?,
            None => EditorState::empty(registry.clone()),
        };
        info!(
            namespace = %self.config.namespace,
            node_types = registry.types().count(),
            "editor created"
        );
        Ok(Editor {
            inner: Rc::new(EditorInner::new(self.config, registry, state, self.on_error)),
        })
    }
}

impl Editor {
    /// An editor with the built-in node types and default configuration.
    pub fn new() -> Self {
        let registry = Arc::new(NodeRegistry::with_builtins());
        let state = EditorState::empty(registry.clone());
        Editor {
            inner: Rc::new(EditorInner::new(EditorConfig::default(), registry, state, None)),
        }
    }

    pub fn builder() -> EditorBuilder {
        EditorBuilder::new()
    }

    pub fn downgrade(&self) -> WeakEditor {
        WeakEditor(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.inner.registry
    }

    /// Number of commits so far.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    // ---------------------------------------------------------------------
    // Updates
    // ---------------------------------------------------------------------

    pub fn update(
        &self,
        f: impl FnOnce(&mut UpdateContext<'_>) -> EditorResult<()> + 'static,
    ) -> EditorResult<()> {
        self.update_with(UpdateOptions::default(), f)
    }

    pub fn update_with(
        &self,
        options: UpdateOptions,
        f: impl FnOnce(&mut UpdateContext<'_>) -> EditorResult<()> + 'static,
    ) -> EditorResult<()> {
        run_update(self, Box::new(f), options)
    }

    /// Commit batched updates. Inside an update this does nothing; the
    /// batch commits once the outer update is flushed.
    pub fn flush(&self) -> EditorResult<()> {
        loop {
            if self.inner.updating.get() || self.inner.pending.borrow().is_none() {
                return Ok(());
            }
            commit::commit_pending(self)?;
        }
    }

    /// Run `f` against the current state after committing pending updates.
    pub fn read<T>(&self, f: impl FnOnce(&EditorState) -> T) -> EditorResult<T> {
        self.flush()?;
        let state = self.inner.current.borrow().clone();
        Ok(f(&state))
    }

    /// The last committed state.
    pub fn get_editor_state(&self) -> EditorState {
        self.inner.current.borrow().clone()
    }

    /// Replace the whole document. The DOM is rebuilt from scratch.
    pub fn set_editor_state(&self, state: EditorState) -> EditorResult<()> {
        self.set_editor_state_with(state, UpdateOptions::default())
    }

    pub fn set_editor_state_with(&self, state: EditorState, options: UpdateOptions) -> EditorResult<()> {
        if state.get_node(NodeKey::ROOT).is_none() {
            return Err(EditorError::NoRootElement);
        }
        self.update_with(options.discrete(), move |ctx| {
            ctx.replace_state(state);
            Ok(())
        })
    }

    pub fn parse_editor_state(&self, json: &str) -> EditorResult<EditorState> {
        EditorState::from_json_str(self.inner.registry.clone(), json)
    }

    // ---------------------------------------------------------------------
    // DOM attachment
    // ---------------------------------------------------------------------

    /// Render into `root` and start observing it. The previous root, if
    /// any, is released.
    pub fn set_root_element(&self, document: &SharedDocument, root: DomNodeId) -> EditorResult<()> {
        self.flush()?;
        let prev = self.root_handle();
        if let Some((prev_doc, prev_root)) = &prev {
            if Rc::ptr_eq(prev_doc, document) && *prev_root == root {
                return Ok(());
            }
            prev_doc.borrow_mut().disconnect();
        }
        *self.inner.root.borrow_mut() = Some((document.clone(), root));
        {
            let mut doc = document.borrow_mut();
            let editable = if self.inner.editable.get() { "true" } else { "false" };
            doc.set_attribute(root, "contenteditable", editable)?;
            doc.set_attribute(root, "data-weft-editor", self.inner.config.namespace.as_str())?;
        }
        let state = self.get_editor_state();
        self.render_root(&state)?;
        document.borrow_mut().observe(root);
        debug!(root = %root, "root element attached");
        self.notify_root(Some(root), prev.map(|(_, dom)| dom));
        Ok(())
    }

    /// Detach from the DOM. The document keeps whatever was rendered.
    pub fn clear_root_element(&self) -> EditorResult<()> {
        self.flush()?;
        let Some((document, root)) = self.inner.root.borrow_mut().take() else {
            return Ok(());
        };
        document.borrow_mut().disconnect();
        self.inner.dom_map.borrow_mut().clear();
        self.notify_root(None, Some(root));
        Ok(())
    }

    pub fn root_element(&self) -> Option<DomNodeId> {
        self.inner.root.borrow().as_ref().map(|(_, root)| *root)
    }

    pub(crate) fn root_handle(&self) -> Option<(SharedDocument, DomNodeId)> {
        self.inner.root.borrow().clone()
    }

    /// The DOM rendered for `key`.
    pub fn element_by_key(&self, key: NodeKey) -> Option<DomNodeId> {
        self.inner.dom_map.borrow().get(key)
    }

    /// The node rendered as `dom` or as its nearest rendered ancestor.
    pub fn key_for_dom(&self, dom: DomNodeId) -> Option<NodeKey> {
        let (document, _) = self.root_handle()?;
        let doc = document.borrow();
        self.inner.dom_map.borrow().nearest_key(&doc, dom)
    }

    /// Rebuild every DOM node under the root element from `state`.
    pub(crate) fn render_root(&self, state: &EditorState) -> EditorResult<()> {
        let Some((document, root)) = self.root_handle() else {
            return Ok(());
        };
        let pending = PendingState::full(state);
        let errors = {
            let mut doc = document.borrow_mut();
            let observing = doc.is_observing();
            doc.disconnect();
            let mut dom_map = self.inner.dom_map.borrow_mut();
            let mut reconciler =
                Reconciler::new(state, &pending, &mut doc, &mut dom_map, &self.inner.config);
            let result = reconciler.reconcile(root);
            let errors = reconciler.into_errors();
            if observing {
                doc.reconnect();
            }
            result?;
            errors
        };
        for err in errors {
            error!(error = %err, "node failed to render");
            self.report_error(&err);
        }
        Ok(())
    }

    fn notify_root(&self, root: Option<DomNodeId>, prev: Option<DomNodeId>) {
        for listener in self.inner.listeners.root.snapshot() {
            listener(root, prev);
        }
    }

    // ---------------------------------------------------------------------
    // Editable, focus, composition
    // ---------------------------------------------------------------------

    pub fn is_editable(&self) -> bool {
        self.inner.editable.get()
    }

    pub fn set_editable(&self, editable: bool) -> EditorResult<()> {
        if self.inner.editable.replace(editable) == editable {
            return Ok(());
        }
        if let Some((document, root)) = self.root_handle() {
            let value = if editable { "true" } else { "false" };
            document.borrow_mut().set_attribute(root, "contenteditable", value)?;
        }
        for listener in self.inner.listeners.editable.snapshot() {
            listener(editable);
        }
        Ok(())
    }

    /// Focus the root element. Without a selection the caret goes to the
    /// start of the document.
    pub fn focus(&self) -> EditorResult<()> {
        if let Some((document, root)) = self.root_handle() {
            document.borrow_mut().focus(root);
        }
        self.update_with(UpdateOptions::new().discrete(), |ctx| {
            if ctx.get_selection().is_none() {
                ctx.select_start(NodeKey::ROOT)?;
            }
            ctx.dispatch_command(&FOCUS_COMMAND, ())?;
            Ok(())
        })
    }

    pub fn blur(&self) -> EditorResult<()> {
        if let Some((document, _)) = self.root_handle() {
            let mut doc = document.borrow_mut();
            doc.blur();
            doc.clear_selection();
        }
        self.update(|ctx| ctx.dispatch_command(&BLUR_COMMAND, ()).map(|_| ()))
    }

    pub fn composition_key(&self) -> Option<NodeKey> {
        self.inner.composition_key.get()
    }

    pub(crate) fn set_composition_key(&self, key: Option<NodeKey>) {
        self.inner.composition_key.set(key);
    }

    /// Decorator payloads of the current state, by key.
    pub fn decorators(&self) -> BTreeMap<NodeKey, Value> {
        self.inner.decorators.borrow().clone()
    }

    pub(crate) fn report_error(&self, err: &EditorError) {
        error!(error = %err, "editor error");
        if let Some(handler) = self.inner.on_error.clone() {
            handler(err, self);
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    pub fn register_command<P: 'static>(
        &self,
        command: &Command<P>,
        priority: CommandPriority,
        handler: impl Fn(&P, &mut UpdateContext<'_>) -> EditorResult<bool> + 'static,
    ) -> Unsubscribe {
        self.inner.commands.register(command, priority, handler)
    }

    /// Dispatch in a new update. While another update runs the dispatch is
    /// queued behind it and `false` is returned.
    pub fn dispatch_command<P: 'static>(&self, command: &Command<P>, payload: P) -> EditorResult<bool> {
        let handled = Rc::new(Cell::new(false));
        let out = handled.clone();
        let command = *command;
        run_update(
            self,
            Box::new(move |ctx| {
                out.set(ctx.dispatch_command(&command, payload)?);
                Ok(())
            }),
            UpdateOptions::default(),
        )?;
        Ok(handled.get())
    }

    // ---------------------------------------------------------------------
    // Listeners and transforms
    // ---------------------------------------------------------------------

    pub fn register_update_listener(&self, listener: impl Fn(&crate::UpdatePayload) + 'static) -> Unsubscribe {
        let listener: Rc<UpdateListener> = Rc::new(listener);
        self.inner.listeners.update.add(listener)
    }

    /// Called right away with the current root, then on every change.
    pub fn register_root_listener(
        &self,
        listener: impl Fn(Option<DomNodeId>, Option<DomNodeId>) + 'static,
    ) -> Unsubscribe {
        let listener: Rc<RootListener> = Rc::new(listener);
        listener(self.root_element(), None);
        self.inner.listeners.root.add(listener)
    }

    pub fn register_decorator_listener(
        &self,
        listener: impl Fn(&BTreeMap<NodeKey, Value>) + 'static,
    ) -> Unsubscribe {
        let listener: Rc<DecoratorListener> = Rc::new(listener);
        self.inner.listeners.decorator.add(listener)
    }

    pub fn register_text_content_listener(&self, listener: impl Fn(&str) + 'static) -> Unsubscribe {
        let listener: Rc<TextContentListener> = Rc::new(listener);
        self.inner.listeners.text_content.add(listener)
    }

    pub fn register_mutation_listener(
        &self,
        node_type: &str,
        listener: impl Fn(&BTreeMap<NodeKey, NodeMutation>, &crate::UpdatePayload) + 'static,
    ) -> EditorResult<Unsubscribe> {
        self.inner.registry.get(node_type)?;
        let listener: Rc<MutationListener> = Rc::new(listener);
        Ok(self.inner.listeners.mutation_set(node_type).add(listener))
    }

    pub fn register_editable_listener(&self, listener: impl Fn(bool) + 'static) -> Unsubscribe {
        let listener: Rc<EditableListener> = Rc::new(listener);
        self.inner.listeners.editable.add(listener)
    }

    /// Register a transform and mark every existing node of `node_type`
    /// dirty so it sees them.
    pub fn register_node_transform(
        &self,
        node_type: &str,
        transform: impl Fn(&mut UpdateContext<'_>, NodeKey) -> EditorResult<()> + 'static,
    ) -> EditorResult<Unsubscribe> {
        self.inner.registry.get(node_type)?;
        let transform: Rc<NodeTransform> = Rc::new(transform);
        let handle = self.inner.transforms.register(node_type, transform);
        let node_type = node_type.to_string();
        self.update(move |ctx| {
            for key in ctx.nodes_of_type(&node_type) {
                if ctx.is_attached(key) {
                    ctx.mark_dirty(key)?;
                }
            }
            Ok(())
        })?;
        Ok(handle)
    }
}
