use waypoint_core::Message;

use super::ArgumentResolver;
use super::coerce::coerce_str;
use crate::error::{ArgumentResolutionError, ResolveResult};
use crate::handler::{ArgumentValue, ParameterDescriptor, ResolutionKind};
use crate::matcher::PathVariables;

/// Binds a variable captured by the matched pattern, parsed to the declared
/// scalar type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathVariableResolver;

impl ArgumentResolver for PathVariableResolver {
    fn name(&self) -> &'static str {
        "path variable"
    }

    fn supports(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.kind, ResolutionKind::PathVariable { .. })
            && param.declared_type.kind.is_scalar()
    }

    fn resolve(
        &self,
        param: &ParameterDescriptor,
        _message: &Message,
        variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue> {
        let ResolutionKind::PathVariable { name } = &param.kind else {
            return Err(ArgumentResolutionError::Unbound { index: param.index });
        };

        match variables.get(name) {
            Some(raw) => coerce_str(raw, &param.declared_type, &param.label()),
            None if param.declared_type.optional => Ok(ArgumentValue::Null),
            None => Err(ArgumentResolutionError::MissingPathVariable { name: name.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> PathVariables {
        PathVariables::from([("id".to_string(), "12".to_string())])
    }

    #[test]
    fn test_binds_integer() {
        let param = ParameterDescriptor::path_variable::<i64>("id");
        assert_eq!(
            PathVariableResolver
                .resolve(&param, &Message::default(), &vars())
                .unwrap(),
            ArgumentValue::I64(12)
        );
    }

    #[test]
    fn test_missing_variable() {
        let required = ParameterDescriptor::path_variable::<String>("name");
        assert_eq!(
            PathVariableResolver
                .resolve(&required, &Message::default(), &vars())
                .unwrap_err(),
            ArgumentResolutionError::MissingPathVariable {
                name: "name".into()
            }
        );

        let optional = ParameterDescriptor::path_variable::<Option<String>>("name");
        assert_eq!(
            PathVariableResolver
                .resolve(&optional, &Message::default(), &vars())
                .unwrap(),
            ArgumentValue::Null
        );
    }

    #[test]
    fn test_type_mismatch() {
        let param = ParameterDescriptor::path_variable::<bool>("id");
        assert!(matches!(
            PathVariableResolver.resolve(&param, &Message::default(), &vars()),
            Err(ArgumentResolutionError::TypeMismatch { .. })
        ));
    }
}
