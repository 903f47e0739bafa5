//! Declares variables that are assigned without ever being declared.

use super::{Rule, RuleSettings, Step};
use crate::census::Census;
use crate::context::FileContext;
use crate::globals::{self, GlobalRef};
use crate::placement::{self, Placement};
use crate::usage;

pub struct LeakingGlobals<'a> {
    census: Option<&'a Census>,
    settings: &'a RuleSettings,
}

impl<'a> LeakingGlobals<'a> {
    pub fn new(census: Option<&'a Census>, settings: &'a RuleSettings) -> Self {
        LeakingGlobals { census, settings }
    }

    /// A written global that no other file exposes and that is not supplied
    /// from outside.
    fn is_leak(&self, global: &GlobalRef) -> bool {
        global.written
            && !self.settings.externals.contains(&global.name)
            && !self.census.is_some_and(|c| c.is_exposed(&global.name))
    }
}

impl Rule for LeakingGlobals<'_> {
    type Symbol = String;

    const NAME: &'static str = "leaking-global-vars";

    fn eligible(&self, cx: &FileContext) -> Vec<String> {
        globals::find_globals(cx.tree(), cx.scopes())
            .into_iter()
            .filter(|g| self.is_leak(g))
            .map(|g| g.name)
            .collect()
    }

    fn step(&self, cx: &FileContext, name: &String) -> Step {
        let Some(global) = globals::find_globals(cx.tree(), cx.scopes())
            .into_iter()
            .find(|g| g.name == *name && self.is_leak(g))
        else {
            return Step::Done;
        };
        let ranges = global.ranges();
        let usages = usage::find(cx.scopes(), cx.root(), name, Some(&ranges));
        match placement::place(cx, name, &usages, self.settings.split_mode) {
            Placement::Placed { edits, diagnostics } => Step::Edit { edits, diagnostics },
            Placement::Unplaced(mut diagnostic) => {
                if diagnostic.line == 0
                    && let Some(first) = global.sites.first()
                {
                    diagnostic = diagnostic.at(cx.source(), first.text_range().start());
                }
                Step::Skip(diagnostic)
            }
        }
    }
}
