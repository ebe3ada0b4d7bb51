//! Built-in extensions that need no plugin
//!
//! Logic combinators over nested conditions, a constant-true evaluator and a
//! modifier declared entirely from data.

use crate::{bonus, Bonus, Condition, Engine, Evaluator, Extension, Modifier, Result, Variant};
use serde::{Deserialize, Serialize};

/// `{type: "/all", conditions: [..]}`: every nested condition holds
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEvaluator;

impl Extension for AllEvaluator {
    fn kind(&self) -> &str {
        "/all"
    }
}

impl Evaluator for AllEvaluator {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        engine.evaluate(&condition.payload_list("conditions")?)
    }
}

/// `{type: "/any", conditions: [..]}`: at least one nested condition holds
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyEvaluator;

impl Extension for AnyEvaluator {
    fn kind(&self) -> &str {
        "/any"
    }
}

impl Evaluator for AnyEvaluator {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        for nested in condition.payload_list("conditions")? {
            if engine.evaluate_one(&nested)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// `{type: "/not", condition: {..}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEvaluator;

impl Extension for NotEvaluator {
    fn kind(&self) -> &str {
        "/not"
    }
}

impl Evaluator for NotEvaluator {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        Ok(!engine.evaluate_one(&condition.payload_field("condition")?)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrueEvaluator;

impl Extension for TrueEvaluator {
    fn kind(&self) -> &str {
        "/true"
    }
}

impl Evaluator for TrueEvaluator {
    fn evaluate(&self, _condition: &Condition, _engine: &Engine) -> Result<bool> {
        Ok(true)
    }
}

/// A modifier declared from content
///
/// ```
/// use idlekit_core::{stdlib::ConfiguredModifier, Modifier, Payload, Variant};
///
/// let modifier: ConfiguredModifier = ron::from_str(
///     r#"(type: "/bonus/speed", variant: "multiplicative", default: 1.0, keys: ["id"])"#,
/// ).unwrap();
/// assert_eq!(modifier.variant(), Variant::Multiplicative);
///
/// let bonus = Payload::new("/bonus/speed").with("id", "farm");
/// assert_eq!(modifier.stringify(&bonus).unwrap(), "/bonus/speed:farm");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredModifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub variant: Variant,
    #[serde(default)]
    pub default: f64,
    /// Fields that, with the type, make up a bonus identity
    #[serde(default)]
    pub keys: Vec<String>,
}

impl ConfiguredModifier {
    pub fn new(kind: impl Into<String>, variant: Variant, default: f64) -> Self {
        Self {
            kind: kind.into(),
            variant,
            default,
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }
}

impl Extension for ConfiguredModifier {
    fn kind(&self) -> &str {
        &self.kind
    }
}

impl Modifier for ConfiguredModifier {
    fn variant(&self) -> Variant {
        self.variant.clone()
    }

    fn default_value(&self) -> f64 {
        self.default
    }

    fn stringify(&self, bonus: &Bonus) -> Result<String> {
        bonus::identity(bonus, self.keys.as_slice())
    }
}

/// Register the evaluators of this module
pub fn register(engine: &mut Engine) -> Result<()> {
    engine.register_evaluator(AllEvaluator)?;
    engine.register_evaluator(AnyEvaluator)?;
    engine.register_evaluator(NotEvaluator)?;
    engine.register_evaluator(TrueEvaluator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Payload, Plugin, Value};
    use std::any::Any;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register(&mut engine).unwrap();
        engine
    }

    fn truth() -> Value {
        Payload::new("/true").into_value()
    }

    fn falsity() -> Value {
        Payload::new("/not").with("condition", truth()).into_value()
    }

    #[test]
    fn test_combinators() {
        let engine = engine();

        let all = Payload::new("/all").with("conditions", vec![truth(), falsity()]);
        let any = Payload::new("/any").with("conditions", vec![falsity(), truth()]);
        let none = Payload::new("/any").with("conditions", Vec::<Value>::new());
        let empty_all = Payload::new("/all").with("conditions", Vec::<Value>::new());

        assert!(!engine.evaluate_one(&all).unwrap());
        assert!(engine.evaluate_one(&any).unwrap());
        assert!(!engine.evaluate_one(&none).unwrap());
        assert!(engine.evaluate_one(&empty_all).unwrap());
    }

    #[test]
    fn test_nested_unknown_type_propagates() {
        let engine = engine();
        let all = Payload::new("/all").with("conditions", vec![Payload::new("/mystery").into_value()]);

        assert!(matches!(
            engine.evaluate_one(&all),
            Err(Error::ConditionNotFound { ref kind, .. }) if kind == "/mystery"
        ));
    }

    #[test]
    fn test_not_requires_condition_field() {
        let engine = engine();
        assert!(matches!(
            engine.evaluate_one(&Payload::new("/not")),
            Err(Error::InvalidPayload { .. })
        ));
    }

    struct Boosts(Vec<Bonus>);

    impl Plugin for Boosts {
        fn name(&self) -> &str {
            "boosts"
        }

        fn bonuses(&self) -> Vec<Bonus> {
            self.0.clone()
        }

        fn save(&self) -> Value {
            Value::Null
        }

        fn load(&mut self, _data: Value) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn speed(id: &str, amount: f64) -> Bonus {
        Payload::new("/bonus/speed").with("id", id).with("amount", amount)
    }

    #[test]
    fn test_configured_modifier_groups_by_keys() {
        let mut engine = Engine::builder()
            .plugin(Boosts(vec![speed("farm", 0.5), speed("mine", 1.0), speed("farm", 1.0)]))
            .modifier(ConfiguredModifier::new("/bonus/speed", Variant::Multiplicative, 2.0).with_key("id"))
            .build()
            .unwrap();
        engine.pre_tick().unwrap();

        let farm = Payload::new("/bonus/speed").with("id", "farm");
        let quarry = Payload::new("/bonus/speed").with("id", "quarry");
        assert_eq!(engine.get_bonus(&farm).unwrap(), 6.0);
        assert_eq!(engine.get_bonus(&quarry).unwrap(), 2.0);
    }

    #[test]
    fn test_configured_modifier_unknown_variant() {
        let modifier: ConfiguredModifier =
            ron::from_str(r#"(type: "/bonus/speed", variant: "exponential", default: 3.0)"#).unwrap();
        assert_eq!(modifier.variant, Variant::Unknown("exponential".into()));

        let mut engine = Engine::builder()
            .plugin(Boosts(vec![speed("farm", 0.5)]))
            .modifier(modifier)
            .build()
            .unwrap();
        engine.pre_tick().unwrap();

        assert_eq!(engine.get_bonus(&Payload::new("/bonus/speed")).unwrap(), 0.0);
    }
}
