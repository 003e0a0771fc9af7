//! Model bridge
//!
//! Executes model-backed functions: renders the prompt template with the
//! call's argument values, sends it through the configured client exactly
//! once, and coerces the raw text response to the declared return type.
//!
//! The two failure modes stay distinct. A transport failure becomes
//! `VibeError::ModelConnection`; a response that cannot be read as the
//! declared type becomes `VibeError::Runtime`.

use crate::codegen::{Function, ModelFunction};
use crate::error::{VibeError, VibeResult};
use crate::parser::ast::Type;
use crate::runtime::client::ModelClient;
use crate::runtime::value::Value;
use std::time::Duration;

/// Runs one model-backed call end to end
pub fn invoke_model(
    client: &dyn ModelClient,
    function: &Function,
    model: &ModelFunction,
    args: &[Value],
    timeout: Duration,
) -> VibeResult<Value> {
    let rendered = render_prompt(&model.template, &function.params, args);
    let prompt = match &model.meaning {
        Some(meaning) => format!("{}\nRespond with {}.", rendered, meaning),
        None => rendered,
    };

    let response = client
        .invoke(&prompt, timeout)
        .map_err(|e| VibeError::model_connection(e.to_string()))?;

    coerce(&response, function.return_type)
}

/// Substitutes `{param}` placeholders with canonical value text
///
/// The analyzer has already checked every placeholder against the parameter
/// list; an unmatched one is left verbatim rather than panicking.
pub fn render_prompt(template: &str, params: &[(String, Type)], args: &[Value]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            rendered.push(c);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            name.push(inner);
        }
        // The analyzer rejects unterminated placeholders at compile time;
        // here they pass through verbatim rather than substituting.
        let substitution = if closed {
            params
                .iter()
                .position(|(param, _)| *param == name)
                .and_then(|i| args.get(i))
        } else {
            None
        };
        match substitution {
            Some(value) => rendered.push_str(&value.to_string()),
            None => {
                rendered.push('{');
                rendered.push_str(&name);
                if closed {
                    rendered.push('}');
                }
            }
        }
    }
    rendered
}

/// Coerces a raw model response to the declared return type
pub fn coerce(response: &str, ty: Type) -> VibeResult<Value> {
    let trimmed = response.trim();
    match ty {
        Type::String => Ok(Value::string(trimmed)),

        Type::Int => trimmed
            .parse::<i64>()
            .map(Value::int)
            .map_err(|_| coercion_error(trimmed, ty)),

        Type::Float => trimmed
            .parse::<f64>()
            .map(Value::float)
            .map_err(|_| coercion_error(trimmed, ty)),

        Type::Number => trimmed
            .parse::<f64>()
            .map(Value::number)
            .map_err(|_| coercion_error(trimmed, ty)),

        Type::Bool => {
            let word = trimmed.trim_end_matches('.').to_ascii_lowercase();
            match word.as_str() {
                "true" | "yes" => Ok(Value::bool(true)),
                "false" | "no" => Ok(Value::bool(false)),
                _ => Err(coercion_error(trimmed, ty)),
            }
        }

        // A Null-typed boundary accepts any response.
        Type::Null => Ok(Value::null()),
    }
}

fn coercion_error(response: &str, ty: Type) -> VibeError {
    let mut snippet: String = response.chars().take(60).collect();
    if snippet.len() < response.len() {
        snippet.push_str("...");
    }
    VibeError::runtime(
        format!("model response '{}' cannot be read as {}", snippet, ty),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(names: &[(&str, Type)]) -> Vec<(String, Type)> {
        names.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let params = params(&[("city", Type::String), ("day", Type::Int)]);
        let args = [Value::string("Paris"), Value::int(3)];
        assert_eq!(
            render_prompt("Weather in {city} in {day} days, {city}?", &params, &args),
            "Weather in Paris in 3 days, Paris?"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholder() {
        assert_eq!(render_prompt("hello {who}", &[], &[]), "hello {who}");
    }

    #[test]
    fn test_render_never_substitutes_truncated_placeholder() {
        let params = params(&[("city", Type::String)]);
        let args = [Value::string("Paris")];
        assert_eq!(
            render_prompt("Weather in {city", &params, &args),
            "Weather in {city"
        );
    }

    #[test]
    fn test_coerce_bool_accepts_natural_answers() {
        assert_eq!(coerce("true", Type::Bool).unwrap(), Value::bool(true));
        assert_eq!(coerce(" Yes. ", Type::Bool).unwrap(), Value::bool(true));
        assert_eq!(coerce("NO", Type::Bool).unwrap(), Value::bool(false));
        assert_eq!(coerce("False.", Type::Bool).unwrap(), Value::bool(false));
    }

    #[test]
    fn test_coerce_bool_rejects_noise() {
        let err = coerce("maybe", Type::Bool).unwrap_err();
        assert!(matches!(err, VibeError::Runtime { .. }));
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce(" 42 ", Type::Int).unwrap(), Value::int(42));
        assert_eq!(coerce("2.5", Type::Float).unwrap(), Value::float(2.5));
        assert_eq!(coerce("2.5", Type::Number).unwrap(), Value::number(2.5));
        assert!(matches!(
            coerce("forty-two", Type::Int),
            Err(VibeError::Runtime { .. })
        ));
    }

    #[test]
    fn test_coerce_string_trims() {
        assert_eq!(
            coerce("  hello there \n", Type::String).unwrap(),
            Value::string("hello there")
        );
    }

    #[test]
    fn test_coercion_error_truncates_long_responses() {
        let long = "x".repeat(200);
        let err = coerce(&long, Type::Int).unwrap_err();
        assert!(err.message().contains("..."));
        assert!(err.message().len() < 200);
    }
}
