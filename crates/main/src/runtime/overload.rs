////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use crate::runtime::{GenericOwner, MethodMeta, TypeMeta, TypeShape};

/// A description of an invocation argument used to select an overload.
#[derive(Clone, Copy, Debug)]
pub enum ArgumentShape {
    /// An argument of a known type.
    Typed(&'static TypeMeta),

    /// A nil literal that matches any parameter of a reference type.
    Nil,

    /// A lambda expression with the specified number of parameters whose
    /// parameter types are not known yet. Matches any parameter of a
    /// function type of the same arity.
    Lambda(usize),
}

/// The outcome of [select_overload].
#[derive(Clone, Debug)]
pub enum OverloadResolution {
    /// The unique best candidate. Generic method definitions are returned
    /// instantiated.
    Selected(&'static MethodMeta),

    /// None of the candidates accepts the arguments.
    NotFound,

    /// Several candidates accept the arguments equally well.
    Ambiguous(Vec<&'static MethodMeta>),
}

/// Selects the method that best fits the arguments.
///
/// Each applicable candidate is scored by the sum of the distances from the
/// argument types to the parameter types, and the candidate with the lowest
/// score wins. Generic method definitions are instantiated with the
/// explicit `type_arguments`, or with the type arguments inferred from the
/// typed arguments when none are given.
///
/// If several candidates share the lowest score, and exactly one of them
/// returns the `expected` type, that candidate wins. Otherwise the
/// resolution is ambiguous.
pub fn select_overload(
    candidates: &[&'static MethodMeta],
    arguments: &[ArgumentShape],
    type_arguments: &[&'static TypeMeta],
    expected: Option<&'static TypeMeta>,
) -> OverloadResolution {
    let mut scored = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let Some(method) = instantiate(*candidate, arguments, type_arguments) else {
            continue;
        };

        let Some(score) = score(method, arguments) else {
            continue;
        };

        scored.push((method, score));
    }

    let Some(best) = scored.iter().map(|(_, score)| *score).min() else {
        return OverloadResolution::NotFound;
    };

    let mut winners = scored
        .into_iter()
        .filter(|(_, score)| *score == best)
        .map(|(method, _)| method)
        .collect::<Vec<_>>();

    if winners.len() > 1 {
        if let Some(expected) = expected {
            let steered = winners
                .iter()
                .copied()
                .filter(|method| method.ret() == expected)
                .collect::<Vec<_>>();

            if let [method] = steered.as_slice() {
                return OverloadResolution::Selected(*method);
            }
        }
    }

    match winners.len() {
        1 => match winners.pop() {
            Some(method) => OverloadResolution::Selected(method),
            None => OverloadResolution::NotFound,
        },

        _ => OverloadResolution::Ambiguous(winners),
    }
}

fn instantiate(
    candidate: &'static MethodMeta,
    arguments: &[ArgumentShape],
    type_arguments: &[&'static TypeMeta],
) -> Option<&'static MethodMeta> {
    match (candidate.is_generic_definition(), type_arguments.is_empty()) {
        (false, true) => Some(candidate),
        (false, false) => None,
        (true, false) => candidate.make_generic(type_arguments),
        (true, true) => infer(candidate, arguments),
    }
}

fn infer(candidate: &'static MethodMeta, arguments: &[ArgumentShape]) -> Option<&'static MethodMeta> {
    if candidate.parameters().len() != arguments.len() {
        return None;
    }

    let mut bindings = vec![None; candidate.generic_parameters().len()];

    for (parameter, argument) in candidate.parameters().iter().zip(arguments) {
        if let ArgumentShape::Typed(actual) = argument {
            unify(parameter.ty, *actual, &mut bindings);
        }
    }

    let inferred = bindings.into_iter().collect::<Option<Vec<_>>>()?;

    candidate.make_generic(&inferred)
}

fn unify(
    formal: &'static TypeMeta,
    actual: &'static TypeMeta,
    bindings: &mut [Option<&'static TypeMeta>],
) {
    match formal.shape() {
        TypeShape::Parameter {
            position,
            owner: GenericOwner::Method,
        } => {
            if let Some(slot) = bindings.get_mut(*position) {
                if slot.is_none() {
                    *slot = Some(actual);
                }
            }
        }

        TypeShape::Constructed { definition, arguments } => {
            let Some(view) = actual
                .convertible_chain()
                .into_iter()
                .find(|ty| ty.definition() == Some(*definition))
            else {
                return;
            };

            for (formal, actual) in arguments.iter().zip(view.arguments()) {
                unify(*formal, *actual, bindings);
            }
        }

        TypeShape::Array { element, .. } => {
            if let TypeShape::Array {
                element: actual, ..
            } = actual.shape()
            {
                unify(*element, *actual, bindings);
            }
        }

        TypeShape::Pointer { element } => {
            if let TypeShape::Pointer { element: actual } = actual.shape() {
                unify(*element, *actual, bindings);
            }
        }

        TypeShape::ByRef { element } => {
            if let TypeShape::ByRef { element: actual } = actual.shape() {
                unify(*element, *actual, bindings);
            }
        }

        _ => (),
    }
}

fn score(method: &'static MethodMeta, arguments: &[ArgumentShape]) -> Option<usize> {
    if method.parameters().len() != arguments.len() {
        return None;
    }

    let mut total = 0;

    for (parameter, argument) in method.parameters().iter().zip(arguments) {
        total += match argument {
            ArgumentShape::Typed(actual) => actual.distance_to(parameter.ty)?,

            ArgumentShape::Nil => match parameter.ty.is_value_type() {
                true => return None,
                false => 0,
            },

            ArgumentShape::Lambda(arity) => match parameter.ty.function_signature() {
                Some((parameters, _)) if parameters.len() == *arity => 0,
                _ => return None,
            },
        };
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::runtime::{
        select_overload,
        ArgumentShape,
        Domain,
        MethodDecl,
        OverloadResolution,
        TypeMeta,
        Value,
    };

    fn noop() -> MethodDecl {
        MethodDecl::function("Pick", |_| Ok(Value::Nil))
    }

    #[test]
    fn test_overload_by_distance() {
        let assembly = Domain::get().define_assembly("overload_tests", Version::new(1, 0, 0));

        let animal = assembly.build_type("Animal").build();
        let dog = assembly.build_type("Dog").base(animal).build();
        let host = assembly.build_type("PickHost").build();

        let by_animal = host.define_method(noop().parameter("value", animal));
        let by_object = host.define_method(noop().parameter("value", TypeMeta::object()));
        let by_int = host.define_method(noop().parameter("value", TypeMeta::int32()));

        let candidates = host.methods("Pick");

        assert_eq!(candidates.len(), 3);

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Typed(dog)], &[], None),
            OverloadResolution::Selected(method) if method == by_animal,
        ));

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Typed(TypeMeta::string())], &[], None),
            OverloadResolution::Selected(method) if method == by_object,
        ));

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Typed(TypeMeta::int32())], &[], None),
            OverloadResolution::Selected(method) if method == by_int,
        ));

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Nil], &[], None),
            OverloadResolution::Ambiguous(methods) if methods.len() == 2,
        ));

        assert!(matches!(
            select_overload(&candidates, &[], &[], None),
            OverloadResolution::NotFound,
        ));
    }

    #[test]
    fn test_overload_by_expected_type() {
        let assembly = Domain::get().define_assembly("overload_tests", Version::new(1, 0, 0));

        let host = assembly.build_type("ParseHost").build();

        let _ = host.define_method(
            MethodDecl::function("Parse", |_| Ok(Value::I32(0)))
                .parameter("text", TypeMeta::string())
                .returns(TypeMeta::int32()),
        );

        let as_double = host.define_method(
            MethodDecl::function("Parse", |_| Ok(Value::F64(0.0)))
                .parameter("text", TypeMeta::object())
                .returns(TypeMeta::double()),
        );

        let candidates = host.methods("Parse");

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Nil], &[], None),
            OverloadResolution::Ambiguous(..),
        ));

        assert!(matches!(
            select_overload(&candidates, &[ArgumentShape::Nil], &[], Some(TypeMeta::double())),
            OverloadResolution::Selected(method) if method == as_double,
        ));
    }

    #[test]
    fn test_generic_inference() {
        let assembly = Domain::get().define_assembly("overload_tests", Version::new(1, 0, 0));

        let list = assembly.build_type("InferList").generic(&["T"]).build();
        let host = assembly.build_type("InferHost").build();

        let mut first = MethodDecl::function("First", |_| Ok(Value::Nil));
        let t = first.generic(&["T"])[0];
        let list_of_t = list.make_generic(&[t]).unwrap();

        let _ = host.define_method(first.parameter("list", list_of_t).returns(t));

        let mut apply = MethodDecl::function("Apply", |_| Ok(Value::Nil));
        let u = apply.generic(&["U"])[0];
        let function = TypeMeta::function(&[u], u).unwrap();

        let _ = host.define_method(apply.parameter("value", u).parameter("map", function).returns(u));

        let strings = list.make_generic(&[TypeMeta::string()]).unwrap();

        let OverloadResolution::Selected(method) =
            select_overload(&host.methods("First"), &[ArgumentShape::Typed(strings)], &[], None)
        else {
            panic!("First not selected");
        };

        assert_eq!(method.ret(), TypeMeta::string());
        assert_eq!(method.type_arguments(), &[TypeMeta::string()]);

        let OverloadResolution::Selected(method) = select_overload(
            &host.methods("Apply"),
            &[ArgumentShape::Typed(TypeMeta::int32()), ArgumentShape::Lambda(1)],
            &[],
            None,
        ) else {
            panic!("Apply not selected");
        };

        assert_eq!(method.ret(), TypeMeta::int32());

        assert!(matches!(
            select_overload(
                &host.methods("Apply"),
                &[ArgumentShape::Typed(TypeMeta::int32()), ArgumentShape::Lambda(2)],
                &[],
                None,
            ),
            OverloadResolution::NotFound,
        ));

        let OverloadResolution::Selected(method) = select_overload(
            &host.methods("First"),
            &[ArgumentShape::Nil],
            &[TypeMeta::double()],
            None,
        ) else {
            panic!("explicit First not selected");
        };

        assert_eq!(method.ret(), TypeMeta::double());
    }
}
