//! Extension traits: the capability set every pluggable object implements
//!
//! Extensions are constructed without engine access. The engine calls
//! [`Extension::attach`] once on registration and then hands itself to every
//! capability call, so no extension ever stores a back-reference.

use crate::{Bonus, Condition, Engine, Input, Output, Request, Result, Variant};

/// Common surface of every registered extension
pub trait Extension {
    /// The discriminator this extension is registered under
    fn kind(&self) -> &str;

    /// Second phase of initialization, called when the extension is registered
    ///
    /// Implementations check that whatever they reach through the engine
    /// (usually a plugin) is present.
    fn attach(&self, _engine: &Engine) -> Result<()> {
        Ok(())
    }
}

/// Decides whether a condition holds
pub trait Evaluator: Extension {
    /// Rewrite a private copy of the condition before evaluation
    fn modify(&self, condition: Condition, _engine: &Engine) -> Result<Condition> {
        Ok(condition)
    }

    /// Evaluate the (modified) condition
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool>;
}

/// Checks and applies an input (a cost)
pub trait Consumer: Extension {
    /// Rewrite a private copy of the input before it is checked or consumed
    fn modify(&self, input: Input, _engine: &Engine) -> Result<Input> {
        Ok(input)
    }

    /// Whether `consume` would succeed, without side effects
    fn can_consume(&self, input: &Input, engine: &Engine) -> Result<bool>;

    /// Apply the input unconditionally
    fn consume(&self, input: &Input, engine: &mut Engine) -> Result<()>;
}

/// Checks and applies an output (a reward)
pub trait Producer: Extension {
    /// Rewrite a private copy of the output before it is checked or produced
    fn modify(&self, output: Output, _engine: &Engine) -> Result<Output> {
        Ok(output)
    }

    /// Whether `produce` would succeed, without side effects
    fn can_produce(&self, output: &Output, engine: &Engine) -> Result<bool>;

    /// Apply the output unconditionally
    fn produce(&self, output: &Output, engine: &mut Engine) -> Result<()>;
}

/// Resolves an imperative request outside the transaction path
pub trait Controller: Extension {
    fn resolve(&self, request: &Request, engine: &mut Engine) -> Result<()>;
}

/// Defines how bonus contributions of one type are grouped and combined
pub trait Modifier: Extension {
    /// How contributions sharing an identity are reduced
    fn variant(&self) -> Variant;

    /// Base value of the reduction
    fn default_value(&self) -> f64;

    /// Grouping identity of a bonus query or contribution
    fn stringify(&self, bonus: &Bonus) -> Result<String>;
}
