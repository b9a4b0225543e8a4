//! Field types a template can declare, and the values sheets hold for them.
//!
//! Everything coming from Discord is a string, while sheets store JSON:
//!
//! | type     | chat form          | stored JSON         |
//! |----------|--------------------|---------------------|
//! | abacus   | `12`               | `12`                |
//! | rational | `1.5`              | `1.5`               |
//! | lever    | `on` / `off`       | `true` / `false`    |
//! | scroll   | `any text`         | `"any text"`        |
//! | gauge    | `5/10`             | `[5, 10]`           |

use super::error::FieldError;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Distance from an exact half under which a rational is treated as sitting on the half.
const HALF_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Abacus,
    Rational,
    Lever,
    Scroll,
    Gauge,
}

/// A typed field value.  Sheets persist these as JSON, see [`FieldValue::to_json`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Abacus(i64),
    Rational(f64),
    Lever(bool),
    Scroll(String),
    Gauge { current: i64, max: i64 },
}

/// A named mutation on a field value, e.g. `add` on an abacus.
pub struct Method {
    pub name: &'static str,
    pub usage: &'static str,
    apply: fn(&FieldValue, &[&str]) -> Result<FieldValue, FieldError>,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Abacus,
        FieldKind::Rational,
        FieldKind::Lever,
        FieldKind::Scroll,
        FieldKind::Gauge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Abacus => "abacus",
            FieldKind::Rational => "rational",
            FieldKind::Lever => "lever",
            FieldKind::Scroll => "scroll",
            FieldKind::Gauge => "gauge",
        }
    }

    /// Convert a user-supplied string into a value of this type.  A string is valid for the
    /// type exactly when this succeeds.
    pub fn parse(self, raw: &str) -> Result<FieldValue, FieldError> {
        let invalid = || FieldError::InvalidValue {
            value: raw.to_owned(),
            kind: self,
        };
        let trimmed = raw.trim();

        match self {
            FieldKind::Abacus => trimmed
                .parse::<i64>()
                .map(FieldValue::Abacus)
                .map_err(|_| invalid()),
            FieldKind::Rational => match trimmed.parse::<f64>() {
                // JSON has no representation for infinities or NaN
                Ok(x) if x.is_finite() => Ok(FieldValue::Rational(x)),
                _ => Err(invalid()),
            },
            FieldKind::Lever => match trimmed.to_lowercase().as_str() {
                "on" | "true" | "1" => Ok(FieldValue::Lever(true)),
                "off" | "false" | "0" => Ok(FieldValue::Lever(false)),
                _ => Err(invalid()),
            },
            FieldKind::Scroll => Ok(FieldValue::Scroll(raw.to_owned())),
            FieldKind::Gauge => {
                let mut sides = trimmed.split('/');
                match (sides.next(), sides.next(), sides.next()) {
                    (Some(current), Some(max), None) => {
                        match (current.trim().parse(), max.trim().parse()) {
                            (Ok(current), Ok(max)) => Ok(FieldValue::Gauge { current, max }),
                            _ => Err(invalid()),
                        }
                    }
                    _ => Err(invalid()),
                }
            }
        }
    }

    /// Interpret stored JSON as a value of this type.  `None` if the shape doesn't match.
    pub fn decode(self, json: &Json) -> Option<FieldValue> {
        match self {
            FieldKind::Abacus => json.as_i64().map(FieldValue::Abacus),
            FieldKind::Rational => json.as_f64().map(FieldValue::Rational),
            FieldKind::Lever => json.as_bool().map(FieldValue::Lever),
            FieldKind::Scroll => json.as_str().map(|s| FieldValue::Scroll(s.to_owned())),
            FieldKind::Gauge => match json.as_array()?.as_slice() {
                [current, max] => Some(FieldValue::Gauge {
                    current: current.as_i64()?,
                    max: max.as_i64()?,
                }),
                _ => None,
            },
        }
    }

    /// Display form of a stored value.  Unset values render as `unset`; values whose shape no
    /// longer matches the type render as their raw JSON.
    pub fn render(self, json: &Json) -> String {
        if json.is_null() {
            return "unset".to_owned();
        }

        match self.decode(json) {
            Some(value) => value.to_string(),
            None => json.to_string(),
        }
    }

    pub fn methods(self) -> &'static [Method] {
        match self {
            FieldKind::Abacus => &ABACUS_METHODS,
            FieldKind::Rational => &RATIONAL_METHODS,
            FieldKind::Lever => &LEVER_METHODS,
            FieldKind::Scroll => &[],
            FieldKind::Gauge => &GAUGE_METHODS,
        }
    }

    pub fn method(self, name: &str) -> Option<&'static Method> {
        let name = name.to_lowercase();
        self.methods().iter().find(|method| method.name == name)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FieldValue {
    pub fn to_json(&self) -> Json {
        match self {
            FieldValue::Abacus(n) => Json::from(*n),
            // Rationals are finite by construction, so this never falls back to null
            FieldValue::Rational(x) => Json::from(*x),
            FieldValue::Lever(b) => Json::Bool(*b),
            FieldValue::Scroll(s) => Json::String(s.clone()),
            FieldValue::Gauge { current, max } => Json::from(vec![*current, *max]),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Abacus(n) => write!(f, "{}", n),
            // Debug formatting keeps the trailing `.0` and round-trips exactly
            FieldValue::Rational(x) => write!(f, "{:?}", x),
            FieldValue::Lever(true) => f.write_str("on"),
            FieldValue::Lever(false) => f.write_str("off"),
            FieldValue::Scroll(s) => f.write_str(s),
            FieldValue::Gauge { current, max } => write!(f, "{}/{}", current, max),
        }
    }
}

impl Method {
    /// Apply the method to `value`, producing the replacement value.  `value` is left untouched
    /// on error.
    pub fn apply(&self, value: &FieldValue, args: &[&str]) -> Result<FieldValue, FieldError> {
        (self.apply)(value, args)
    }
}

static ABACUS_METHODS: [Method; 4] = [
    Method {
        name: "add",
        usage: "add <whole number>",
        apply: |value, args| abacus_op(value, args, "add", i64::checked_add),
    },
    Method {
        name: "subtract",
        usage: "subtract <whole number>",
        apply: |value, args| abacus_op(value, args, "subtract", i64::checked_sub),
    },
    Method {
        name: "multiply",
        usage: "multiply <whole number>",
        apply: |value, args| abacus_op(value, args, "multiply", i64::checked_mul),
    },
    Method {
        name: "divide",
        usage: "divide <whole number>",
        apply: |value, args| abacus_op(value, args, "divide", floor_div),
    },
];

static RATIONAL_METHODS: [Method; 7] = [
    Method {
        name: "add",
        usage: "add <number>",
        apply: |value, args| rational_op(value, args, "add", |a, b| Some(a + b)),
    },
    Method {
        name: "subtract",
        usage: "subtract <number>",
        apply: |value, args| rational_op(value, args, "subtract", |a, b| Some(a - b)),
    },
    Method {
        name: "multiply",
        usage: "multiply <number>",
        apply: |value, args| rational_op(value, args, "multiply", |a, b| Some(a * b)),
    },
    Method {
        name: "divide",
        usage: "divide <number>",
        apply: |value, args| {
            rational_op(value, args, "divide", |a, b| (b != 0.0).then(|| a / b))
        },
    },
    Method {
        name: "round",
        usage: "round",
        apply: |value, _args| rational_map(value, round_half_down),
    },
    Method {
        name: "roundup",
        usage: "roundup",
        apply: |value, _args| rational_map(value, f64::ceil),
    },
    Method {
        name: "rounddown",
        usage: "rounddown",
        apply: |value, _args| rational_map(value, f64::floor),
    },
];

static LEVER_METHODS: [Method; 1] = [Method {
    name: "toggle",
    usage: "toggle",
    apply: |value, _args| match value {
        FieldValue::Lever(b) => Ok(FieldValue::Lever(!b)),
        other => Err(mismatch(FieldKind::Lever, other)),
    },
}];

static GAUGE_METHODS: [Method; 4] = [
    Method {
        name: "add",
        usage: "add <whole number>",
        apply: |value, args| gauge_current(value, args, "add", i64::checked_add),
    },
    Method {
        name: "subtract",
        usage: "subtract <whole number>",
        apply: |value, args| gauge_current(value, args, "subtract", i64::checked_sub),
    },
    Method {
        name: "increase",
        usage: "increase <whole number>",
        apply: |value, args| gauge_max(value, args, "increase", i64::checked_add),
    },
    Method {
        name: "decrease",
        usage: "decrease <whole number>",
        apply: |value, args| gauge_max(value, args, "decrease", i64::checked_sub),
    },
];

fn mismatch(kind: FieldKind, value: &FieldValue) -> FieldError {
    FieldError::InvalidValue {
        value: value.to_string(),
        kind,
    }
}

fn out_of_range(method: &'static str) -> FieldError {
    FieldError::InvalidArgument {
        method,
        reason: "result is out of range".to_owned(),
    }
}

fn first_arg<'a>(method: &'static str, args: &[&'a str]) -> Result<&'a str, FieldError> {
    args.first().copied().ok_or_else(|| FieldError::InvalidArgument {
        method,
        reason: "missing argument".to_owned(),
    })
}

fn int_arg(method: &'static str, args: &[&str]) -> Result<i64, FieldError> {
    let arg = first_arg(method, args)?;
    arg.trim()
        .parse()
        .map_err(|_| FieldError::InvalidArgument {
            method,
            reason: format!("`{}` is not a whole number", arg),
        })
}

fn float_arg(method: &'static str, args: &[&str]) -> Result<f64, FieldError> {
    let arg = first_arg(method, args)?;
    match arg.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(FieldError::InvalidArgument {
            method,
            reason: format!("`{}` is not a number", arg),
        }),
    }
}

/// Integer division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Round to the nearest integer, with exact halves going down.  Values within
/// [`HALF_EPSILON`] of a half count as the half, absorbing binary float error left over from
/// earlier arithmetic on the value.
fn round_half_down(x: f64) -> f64 {
    let floor = x.floor();
    if (x - floor - 0.5).abs() <= HALF_EPSILON {
        floor
    } else {
        x.round()
    }
}

fn abacus_op(
    value: &FieldValue,
    args: &[&str],
    method: &'static str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<FieldValue, FieldError> {
    let FieldValue::Abacus(n) = value else {
        return Err(mismatch(FieldKind::Abacus, value));
    };
    let operand = int_arg(method, args)?;

    if method == "divide" && operand == 0 {
        return Err(FieldError::InvalidArgument {
            method,
            reason: "cannot divide by zero".to_owned(),
        });
    }

    op(*n, operand)
        .map(FieldValue::Abacus)
        .ok_or_else(|| out_of_range(method))
}

fn rational_op(
    value: &FieldValue,
    args: &[&str],
    method: &'static str,
    op: fn(f64, f64) -> Option<f64>,
) -> Result<FieldValue, FieldError> {
    let FieldValue::Rational(x) = value else {
        return Err(mismatch(FieldKind::Rational, value));
    };
    let operand = float_arg(method, args)?;

    match op(*x, operand) {
        Some(result) if result.is_finite() => Ok(FieldValue::Rational(result)),
        Some(_) => Err(out_of_range(method)),
        None => Err(FieldError::InvalidArgument {
            method,
            reason: "cannot divide by zero".to_owned(),
        }),
    }
}

fn rational_map(value: &FieldValue, op: fn(f64) -> f64) -> Result<FieldValue, FieldError> {
    match value {
        FieldValue::Rational(x) => Ok(FieldValue::Rational(op(*x))),
        other => Err(mismatch(FieldKind::Rational, other)),
    }
}

fn gauge_current(
    value: &FieldValue,
    args: &[&str],
    method: &'static str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<FieldValue, FieldError> {
    let FieldValue::Gauge { current, max } = value else {
        return Err(mismatch(FieldKind::Gauge, value));
    };
    let operand = int_arg(method, args)?;
    let current = op(*current, operand).ok_or_else(|| out_of_range(method))?;
    Ok(FieldValue::Gauge { current, max: *max })
}

fn gauge_max(
    value: &FieldValue,
    args: &[&str],
    method: &'static str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<FieldValue, FieldError> {
    let FieldValue::Gauge { current, max } = value else {
        return Err(mismatch(FieldKind::Gauge, value));
    };
    let operand = int_arg(method, args)?;
    let max = op(*max, operand).ok_or_else(|| out_of_range(method))?;
    Ok(FieldValue::Gauge {
        current: *current,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(kind: FieldKind, method: &str, value: FieldValue, args: &[&str]) -> FieldValue {
        kind.method(method)
            .unwrap_or_else(|| panic!("{} has no method {}", kind, method))
            .apply(&value, args)
            .unwrap()
    }

    #[test]
    fn test_parse_render_parse_is_stable() {
        let samples: &[(FieldKind, &[&str])] = &[
            (FieldKind::Abacus, &["0", "-7", " 42 ", "+3"]),
            (FieldKind::Rational, &["2", "2.5", "-0.125", "1e20", "0.1"]),
            (FieldKind::Lever, &["on", "TRUE", "1", "off", "false", "0"]),
            (FieldKind::Scroll, &["", "Sword of Truth", "5/10"]),
            (FieldKind::Gauge, &["5/10", "-1/ 3", "0/0"]),
        ];

        for (kind, inputs) in samples {
            for input in *inputs {
                let parsed = kind.parse(input).unwrap();
                let reparsed = kind.parse(&parsed.to_string()).unwrap();
                assert_eq!(parsed, reparsed, "{} round trip of {:?}", kind, input);
            }
        }
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        let rejected = [
            (FieldKind::Abacus, "1.5"),
            (FieldKind::Abacus, "ten"),
            (FieldKind::Rational, "inf"),
            (FieldKind::Rational, "NaN"),
            (FieldKind::Lever, "maybe"),
            (FieldKind::Gauge, "5"),
            (FieldKind::Gauge, "5/10/15"),
            (FieldKind::Gauge, "5/x"),
        ];

        for (kind, input) in rejected {
            assert_eq!(
                kind.parse(input),
                Err(FieldError::InvalidValue {
                    value: input.to_owned(),
                    kind
                }),
                "{} should reject {:?}",
                kind,
                input
            );
        }
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(FieldKind::Gauge.parse("5/10").unwrap().to_json(), json!([5, 10]));
        assert_eq!(FieldKind::Lever.parse("on").unwrap().to_json(), json!(true));
        assert_eq!(FieldKind::Rational.parse("2.5").unwrap().to_json(), json!(2.5));

        let gauge = FieldKind::Gauge.parse("5/10").unwrap();
        assert_eq!(FieldKind::Gauge.decode(&gauge.to_json()), Some(gauge));
        assert_eq!(FieldKind::Gauge.decode(&json!([1, 2, 3])), None);
        assert_eq!(FieldKind::Abacus.decode(&json!("12")), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(FieldKind::Gauge.render(&json!([5, 10])), "5/10");
        assert_eq!(FieldKind::Lever.render(&json!(false)), "off");
        assert_eq!(FieldKind::Rational.render(&json!(2)), "2.0");
        assert_eq!(FieldKind::Abacus.render(&Json::Null), "unset");
        // mismatched shape
        assert_eq!(FieldKind::Abacus.render(&json!([5, 10])), "[5,10]");
    }

    #[test]
    fn test_abacus_divide_floors() {
        let divide = |n, arg| call(FieldKind::Abacus, "divide", FieldValue::Abacus(n), &[arg]);
        assert_eq!(divide(7, "2"), FieldValue::Abacus(3));
        assert_eq!(divide(-7, "2"), FieldValue::Abacus(-4));
        assert_eq!(divide(7, "-2"), FieldValue::Abacus(-4));
        assert_eq!(divide(-8, "2"), FieldValue::Abacus(-4));
    }

    #[test]
    fn test_abacus_arithmetic() {
        let value = FieldValue::Abacus(10);
        assert_eq!(call(FieldKind::Abacus, "add", value.clone(), &["5"]), FieldValue::Abacus(15));
        assert_eq!(
            call(FieldKind::Abacus, "subtract", value.clone(), &["15"]),
            FieldValue::Abacus(-5)
        );
        assert_eq!(call(FieldKind::Abacus, "multiply", value, &["3"]), FieldValue::Abacus(30));
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        let add = FieldKind::Abacus.method("add").unwrap();
        let divide = FieldKind::Abacus.method("divide").unwrap();
        let value = FieldValue::Abacus(1);

        assert!(matches!(
            add.apply(&value, &["x"]),
            Err(FieldError::InvalidArgument { method: "add", .. })
        ));
        assert!(add.apply(&value, &[]).is_err());
        assert!(divide.apply(&value, &["0"]).is_err());
        assert!(add.apply(&FieldValue::Abacus(i64::MAX), &["1"]).is_err());

        let divide = FieldKind::Rational.method("divide").unwrap();
        assert!(divide.apply(&FieldValue::Rational(1.0), &["0"]).is_err());
        assert!(divide.apply(&FieldValue::Rational(1.0), &["nope"]).is_err());
    }

    #[test]
    fn test_rational_rounding() {
        let round = |method, x| call(FieldKind::Rational, method, FieldValue::Rational(x), &[]);
        assert_eq!(round("round", 2.5), FieldValue::Rational(2.0));
        assert_eq!(round("round", 3.5), FieldValue::Rational(3.0));
        assert_eq!(round("round", 2.6), FieldValue::Rational(3.0));
        assert_eq!(round("round", -2.5), FieldValue::Rational(-3.0));
        assert_eq!(round("round", 2.5 + 1e-12), FieldValue::Rational(2.0));
        assert_eq!(round("round", 2.5 + 1e-6), FieldValue::Rational(3.0));
        assert_eq!(round("roundup", 2.1), FieldValue::Rational(3.0));
        assert_eq!(round("rounddown", 2.9), FieldValue::Rational(2.0));
    }

    #[test]
    fn test_rational_divide_is_true_division() {
        let result = call(FieldKind::Rational, "divide", FieldValue::Rational(7.0), &["2"]);
        assert_eq!(result, FieldValue::Rational(3.5));
    }

    #[test]
    fn test_lever_toggle_ignores_arguments() {
        let result = call(FieldKind::Lever, "toggle", FieldValue::Lever(false), &["whatever"]);
        assert_eq!(result, FieldValue::Lever(true));
    }

    #[test]
    fn test_gauge_methods_touch_one_side() {
        let gauge = || FieldKind::Gauge.parse("5/10").unwrap();
        assert_eq!(gauge().to_string(), "5/10");
        assert_eq!(
            call(FieldKind::Gauge, "add", gauge(), &["3"]),
            FieldValue::Gauge { current: 8, max: 10 }
        );
        assert_eq!(
            call(FieldKind::Gauge, "subtract", gauge(), &["7"]),
            FieldValue::Gauge { current: -2, max: 10 }
        );
        assert_eq!(
            call(FieldKind::Gauge, "increase", gauge(), &["2"]),
            FieldValue::Gauge { current: 5, max: 12 }
        );
        assert_eq!(
            call(FieldKind::Gauge, "decrease", gauge(), &["4"]),
            FieldValue::Gauge { current: 5, max: 6 }
        );
    }

    #[test]
    fn test_method_lookup() {
        assert!(FieldKind::Scroll.methods().is_empty());
        assert!(FieldKind::Lever.method("add").is_none());
        assert!(FieldKind::Gauge.method("INCREASE").is_some());
    }
}
