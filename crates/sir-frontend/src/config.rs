use crate::builtins::BuiltinTable;
use sir_core::Ty;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| flag_value(&val))
}

fn flag_value(val: &str) -> bool {
    let trimmed = val.trim();
    !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Hint recorded on the compiled function for the downstream optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlinePolicy {
    #[default]
    Never,
    Everything,
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub builtins: BuiltinTable,
    pub inline_policy: InlinePolicy,
    /// Run the closure lifting pass after emission.
    pub lift_closures: bool,
    /// Type given to parameters without an annotation.
    pub default_param_ty: Ty,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            builtins: BuiltinTable::standard(),
            inline_policy: InlinePolicy::Never,
            lift_closures: true,
            default_param_ty: Ty::Tensor,
        }
    }
}

impl FrontendConfig {
    /// Defaults, overridden by `SIR_INLINE_EVERYTHING` and `SIR_NO_LIFT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if bool_from_env("SIR_INLINE_EVERYTHING") {
            config.inline_policy = InlinePolicy::Everything;
        }
        if bool_from_env("SIR_NO_LIFT") {
            config.lift_closures = false;
        }
        config
    }

    pub fn with_builtins(mut self, builtins: BuiltinTable) -> Self {
        self.builtins = builtins;
        self
    }

    pub fn with_inline_policy(mut self, policy: InlinePolicy) -> Self {
        self.inline_policy = policy;
        self
    }

    pub fn with_lift_closures(mut self, lift: bool) -> Self {
        self.lift_closures = lift;
        self
    }

    pub fn with_default_param_ty(mut self, ty: Ty) -> Self {
        self.default_param_ty = ty;
        self
    }
}
