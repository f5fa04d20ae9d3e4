//! The diagnostics runner.
//!
//! [`Diagnostics`] owns the [`RootStore`], the run's [`Markers`], a
//! [`RuleSet`] and a [`BuiltinRegistry`]. A run walks every document in a
//! fixed priority order, hands each node to the rule set and collects the
//! reports the rules make.

mod diagnostic;

pub use diagnostic::{Diagnostic, DiagnosticNode, Report};

use crate::builtins::BuiltinRegistry;
use crate::error::{NoodlError, Result};
use crate::markers::{MarkerFlag, Markers};
use crate::rules::{RuleContext, RuleSet};
use crate::store::RootStore;
use crate::traverse::{
    AsyncTraversal, AsyncVisitContext, AsyncVisitor, Outcome, Traversal, VisitContext, VisitFn,
    VisitStatus,
};
use async_trait::async_trait;
use indexmap::IndexSet;
use noodl_yaml::Node;
use std::cell::RefCell;
use tracing::{debug, warn};

type RunInitFn<'a> = Box<dyn FnOnce(&mut RootStore, &Markers) -> Result<()> + 'a>;

/// Options for [`Diagnostics::run`].
#[derive(Default)]
pub struct RunOptions<'a> {
    default_callback: Option<VisitFn<'a, Vec<Diagnostic>>>,
    init: Option<RunInitFn<'a>>,
}

impl<'a> RunOptions<'a> {
    /// Called for nodes no rule matched. Defaults to [`Outcome::Keep`].
    pub fn with_default_callback(
        mut self,
        callback: impl for<'c> FnMut(&mut VisitContext<'c, Vec<Diagnostic>>) -> Result<Outcome>
        + 'a,
    ) -> Self {
        self.default_callback = Some(Box::new(callback));
        self
    }

    /// Runs once, before the first document is visited.
    pub fn with_init(
        mut self,
        init: impl FnOnce(&mut RootStore, &Markers) -> Result<()> + 'a,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }
}

/// Options for [`Diagnostics::run_async`].
#[derive(Default)]
pub struct AsyncRunOptions<'a> {
    /// Called for nodes no rule matched. Its `init` runs once per run.
    pub visitor: Option<&'a dyn AsyncVisitor>,
}

/// Orchestrates validation runs over a store.
pub struct Diagnostics {
    store: RootStore,
    markers: Markers,
    rules: RuleSet,
    builtins: BuiltinRegistry,
}

impl Diagnostics {
    /// Runner with the default rule set and no built-ins.
    pub fn new(store: RootStore) -> Self {
        Self::with_rules(store, RuleSet::with_defaults())
    }

    pub fn with_rules(store: RootStore, rules: RuleSet) -> Self {
        Self {
            store,
            markers: Markers::new(),
            rules,
            builtins: BuiltinRegistry::new(),
        }
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    pub fn builtins_mut(&mut self) -> &mut BuiltinRegistry {
        &mut self.builtins
    }

    pub fn set_builtins(&mut self, builtins: BuiltinRegistry) -> &mut Self {
        self.builtins = builtins;
        self
    }

    pub fn store(&self) -> &RootStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RootStore {
        &mut self.store
    }

    pub fn into_store(self) -> RootStore {
        self.store
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Record a marker for later runs.
    pub fn mark(&mut self, flag: MarkerFlag, value: impl Into<String>) -> &mut Self {
        self.markers.mark(flag, value);
        self
    }

    /// Empty diagnostic attached to `page` and optionally a node.
    pub fn create_diagnostic(&self, page: &str, node: Option<&Node>) -> Diagnostic {
        Diagnostic::new(Some(page), node)
    }

    /// Documents in the order a run visits them.
    ///
    /// Root config, app config, preload pages, pages, then every other
    /// document in store order. Names without a document are skipped.
    pub fn visit_order(&self) -> Vec<String> {
        let markers = &self.markers;
        let mut order: IndexSet<&str> = IndexSet::new();
        order.extend(markers.root_config());
        order.extend(markers.app_config());
        order.extend(markers.preload().iter().map(String::as_str));
        order.extend(markers.pages().iter().map(String::as_str));
        order.extend(self.store.names());
        order
            .into_iter()
            .filter(|name| self.store.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Validate every document, one after another.
    ///
    /// Rules may mutate the store as they go; later documents see earlier
    /// write-backs.
    pub fn run(&mut self, options: RunOptions<'_>) -> Result<Vec<Diagnostic>> {
        let RunOptions {
            mut default_callback,
            init,
        } = options;
        let order = self.visit_order();
        let Self {
            store,
            markers,
            rules,
            builtins,
        } = self;

        if let Some(init) = init {
            init(store, markers)?;
        }

        let run = RunContext {
            rules,
            markers,
            builtins,
        };
        let mut reports = Vec::new();
        for page in &order {
            if !store.contains(page) {
                debug!(page = %page, "Document removed before its visit");
                continue;
            }
            debug!(page = %page, "Visiting document");

            let mut diagnostics = Vec::new();
            let mut traversal = Traversal::new();
            traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<Diagnostic>>| {
                if let Some(outcome) = run.dispatch(ctx)? {
                    return Ok(outcome);
                }
                match default_callback.as_mut() {
                    Some(callback) => callback(ctx),
                    None => Ok(Outcome::Keep),
                }
            });
            let status = traversal
                .visit(store, page, &mut diagnostics)
                .inspect_err(|e| warn!(page = %page, error = %e, "Run aborted"))?;
            if status == VisitStatus::Stopped {
                debug!(page = %page, "Visit stopped early");
            }
            reports.append(&mut diagnostics);
        }
        Ok(reports)
    }

    /// Validate every document, starting all visits at once.
    ///
    /// Order within one document is preserved; order across documents is
    /// not. The store is handed back even when a visit fails.
    pub async fn run_async(&mut self, options: AsyncRunOptions<'_>) -> Result<Vec<Diagnostic>> {
        let order = self.visit_order();
        let store = RefCell::new(std::mem::take(&mut self.store));
        let run = RunContext {
            rules: &self.rules,
            markers: &self.markers,
            builtins: &self.builtins,
        };
        let result = run.visit_all(&store, &order, options.visitor).await;
        self.store = store.into_inner();
        result
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("documents", &self.store.len())
            .field("markers", &self.markers)
            .field("rules", &self.rules)
            .finish()
    }
}

/// Borrowed state shared by every document of one run.
struct RunContext<'r> {
    rules: &'r RuleSet,
    markers: &'r Markers,
    builtins: &'r BuiltinRegistry,
}

impl<'r> RunContext<'r> {
    fn dispatch(&self, ctx: &mut VisitContext<'_, Vec<Diagnostic>>) -> Result<Option<Outcome>> {
        let mut rule_ctx = RuleContext::new(
            ctx.node,
            ctx.key,
            ctx.path,
            ctx.page,
            &mut *ctx.store,
            self.markers,
            self.builtins,
            &mut *ctx.data,
        );
        self.rules.dispatch(&mut rule_ctx)
    }

    async fn visit_all(
        &self,
        store: &RefCell<RootStore>,
        order: &[String],
        fallback: Option<&dyn AsyncVisitor>,
    ) -> Result<Vec<Diagnostic>> {
        if let Some(visitor) = fallback {
            visitor.init(store).await?;
        }

        let dispatchers: Vec<AsyncDispatch<'_>> = order
            .iter()
            .map(|_| AsyncDispatch {
                run: self,
                fallback,
                diagnostics: RefCell::new(Vec::new()),
            })
            .collect();

        let visits = order.iter().zip(&dispatchers).map(|(page, dispatch)| async move {
            let present = store
                .try_borrow()
                .map(|guard| guard.contains(page))
                .map_err(|e| NoodlError::StoreBusy(e.to_string()))?;
            if !present {
                debug!(page = %page, "Document removed before its visit");
                return Ok(VisitStatus::Completed);
            }
            debug!(page = %page, "Visiting document");
            let mut traversal = AsyncTraversal::new();
            traversal.use_visitor(dispatch);
            traversal
                .visit(store, page)
                .await
                .inspect_err(|e| warn!(page = %page, error = %e, "Run aborted"))
        });
        futures::future::try_join_all(visits).await?;

        Ok(dispatchers
            .into_iter()
            .flat_map(|dispatch| dispatch.diagnostics.into_inner())
            .collect())
    }
}

/// Per-document async visitor: rules first, then the caller's visitor.
struct AsyncDispatch<'r> {
    run: &'r RunContext<'r>,
    fallback: Option<&'r dyn AsyncVisitor>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

#[async_trait(?Send)]
impl<'r> AsyncVisitor for AsyncDispatch<'r> {
    async fn visit(&self, ctx: AsyncVisitContext<'_>) -> Result<Outcome> {
        let dispatched = {
            let mut store = ctx
                .store
                .try_borrow_mut()
                .map_err(|e| NoodlError::StoreBusy(format!("{} (visiting `{}`)", e, ctx.page)))?;
            let mut diagnostics = self.diagnostics.borrow_mut();
            let mut rule_ctx = RuleContext::new(
                &ctx.node,
                ctx.key.as_ref(),
                &ctx.path,
                ctx.page,
                &mut store,
                self.run.markers,
                self.run.builtins,
                &mut diagnostics,
            );
            self.run.rules.dispatch(&mut rule_ctx)?
        };
        match (dispatched, self.fallback) {
            (Some(outcome), _) => Ok(outcome),
            (None, Some(visitor)) => visitor.visit(ctx).await,
            (None, None) => Ok(Outcome::Keep),
        }
    }
}
