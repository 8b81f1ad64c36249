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

use compact_str::format_compact;

use crate::{
    runtime::{
        select_overload,
        ArgumentShape,
        MemberMeta,
        MethodMeta,
        OverloadResolution,
        TypeMeta,
        Value,
    },
    semantics::{macros::apply_value, ReduceError, ReduceResult},
    symbols::{DispatchKind, SymbolTable},
    tree::{DispatchExpr, Expr, ExprKind},
};

/// The name under which function values expose their invocation.
pub(super) const INVOKE_NAME: &str = "Invoke";

// Resolves a call site through the members of the receiver type.
//
// Returns None if the receiver type has no applicable member.
pub(super) fn reflect(
    site: &DispatchExpr,
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Option<Expr>> {
    let Some(receiver) = &site.receiver else {
        return Ok(None);
    };

    let Some(receiver_ty) = receiver.ty() else {
        return Ok(None);
    };

    let (ty, object) = match receiver_ty.static_target() {
        Some(target) => (target, None),
        None => (receiver_ty, Some(receiver.clone())),
    };

    let wants = |flag: DispatchKind| site.kind.target().is_wildcard() || site.kind.contains(flag);

    if wants(DispatchKind::MEMBER) && site.arguments.is_empty() && site.type_arguments.is_empty() {
        if let Some(member) = find_member(ty, &site.name, object.is_none()) {
            return Expr::member(object, member).map(Some);
        }
    }

    if wants(DispatchKind::METHOD) {
        let candidates = ty
            .methods(&site.name)
            .into_iter()
            .filter(|method| method.is_static() == object.is_none())
            .collect::<Vec<_>>();

        if !candidates.is_empty() {
            let (pending, shapes) = prepare_arguments(&site.arguments, table)?;

            if let Some(method) = select(ty, &site.name, &candidates, &shapes, site, expected)? {
                let arguments = finish_arguments(pending, method, table)?;

                return Expr::call(object, method, arguments).map(Some);
            }
        }

        if let Some(object) = &object {
            if site.kind.contains(DispatchKind::EXTENSION) {
                if let Some(call) = extension(ty, object, site, table, expected)? {
                    return Ok(Some(call));
                }
            }

            if site.name == INVOKE_NAME && ty.function_signature().is_some() {
                return apply_value(object.clone(), &site.arguments, table, expected).map(Some);
            }
        }
    }

    if wants(DispatchKind::CONSTRUCTOR) && object.is_none() {
        let candidates = ty.constructors();

        if !candidates.is_empty() {
            let (pending, shapes) = prepare_arguments(&site.arguments, table)?;

            if let Some(constructor) = select(ty, "new", &candidates, &shapes, site, expected)? {
                let arguments = finish_arguments(pending, constructor, table)?;

                return Expr::new(constructor, arguments).map(Some);
            }
        }
    }

    Ok(None)
}

/// Reduces the arguments of a function invocation with the parameter types
/// as the expected types.
pub(super) fn coerce_arguments(
    arguments: &[Expr],
    parameters: &[&'static TypeMeta],
    table: &SymbolTable,
) -> ReduceResult<Vec<Expr>> {
    if arguments.len() != parameters.len() {
        return Err(ReduceError::ArityMismatch {
            expected: parameters.len(),
            actual: arguments.len(),
            context: "invoke arguments",
        });
    }

    let mut result = Vec::with_capacity(arguments.len());

    for (argument, parameter) in arguments.iter().zip(parameters) {
        let argument = argument.reduce_value(table, Some(*parameter))?;

        result.push(retype_nil(argument, parameter)?);
    }

    Ok(result)
}

fn find_member(ty: &'static TypeMeta, name: &str, is_static: bool) -> Option<MemberMeta> {
    if let Some(field) = ty.field(name) {
        if field.is_static() == is_static {
            return Some(MemberMeta::Field(field));
        }
    }

    if let Some(property) = ty.property(name) {
        if property.is_static() == is_static {
            return Some(MemberMeta::Property(property));
        }
    }

    None
}

// Searches the static methods of the receiver type chain whose first
// parameter accepts the receiver.
fn extension(
    ty: &'static TypeMeta,
    object: &Expr,
    site: &DispatchExpr,
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Option<Expr>> {
    let mut candidates = Vec::<&'static MethodMeta>::new();

    for host in ty.convertible_chain() {
        for method in host.methods(&site.name) {
            if !method.is_static() || method.parameters().is_empty() {
                continue;
            }

            if candidates.iter().any(|known| std::ptr::eq(*known, method)) {
                continue;
            }

            candidates.push(method);
        }
    }

    if candidates.is_empty() {
        return Ok(None);
    }

    let (mut pending, mut shapes) = prepare_arguments(&site.arguments, table)?;

    pending.insert(0, object.clone());
    shapes.insert(0, ArgumentShape::Typed(ty));

    let Some(method) = select(ty, &site.name, &candidates, &shapes, site, expected)? else {
        return Ok(None);
    };

    let arguments = finish_arguments(pending, method, table)?;

    Expr::extension_call(method, arguments).map(Some)
}

fn select(
    ty: &'static TypeMeta,
    name: &str,
    candidates: &[&'static MethodMeta],
    shapes: &[ArgumentShape],
    site: &DispatchExpr,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Option<&'static MethodMeta>> {
    match select_overload(candidates, shapes, &site.type_arguments, expected) {
        OverloadResolution::Selected(method) => Ok(Some(method)),

        OverloadResolution::NotFound => Ok(None),

        OverloadResolution::Ambiguous(found) => Err(ReduceError::AmbiguousMatch {
            subject: format_compact!("{ty}.{name}"),
            candidates: found.len(),
        }),
    }
}

// Reduces the arguments whose types are known without the context. The
// lambdas with untyped parameters are kept until the overload is selected.
fn prepare_arguments(
    arguments: &[Expr],
    table: &SymbolTable,
) -> ReduceResult<(Vec<Expr>, Vec<ArgumentShape>)> {
    let mut pending = Vec::with_capacity(arguments.len());
    let mut shapes = Vec::with_capacity(arguments.len());

    for argument in arguments {
        if let ExprKind::AmbiguousLambda(node) = argument.kind() {
            let untyped = node.parameters.iter().any(|parameter| parameter.ty().is_none());

            if untyped {
                pending.push(argument.clone());
                shapes.push(ArgumentShape::Lambda(node.parameters.len()));
                continue;
            }
        }

        let reduced = argument.reduce_value(table, None)?;

        let shape = match (reduced.is_nil_constant(), reduced.ty()) {
            (true, _) => ArgumentShape::Nil,
            (false, Some(ty)) => ArgumentShape::Typed(ty),

            (false, None) => {
                return Err(ReduceError::TypeMismatch {
                    expected: None,
                    actual: None,
                    context: "call argument",
                })
            }
        };

        pending.push(reduced);
        shapes.push(shape);
    }

    Ok((pending, shapes))
}

fn finish_arguments(
    pending: Vec<Expr>,
    method: &'static MethodMeta,
    table: &SymbolTable,
) -> ReduceResult<Vec<Expr>> {
    let mut arguments = Vec::with_capacity(pending.len());

    for (argument, parameter) in pending.into_iter().zip(method.parameters()) {
        let argument = match argument.kind() {
            ExprKind::AmbiguousLambda(..) => argument.reduce_value(table, Some(parameter.ty))?,
            _ => argument,
        };

        arguments.push(retype_nil(argument, &parameter.ty)?);
    }

    Ok(arguments)
}

fn retype_nil(argument: Expr, parameter: &&'static TypeMeta) -> ReduceResult<Expr> {
    let parameter = *parameter;

    if !argument.is_nil_constant() || argument.ty() == Some(parameter) || parameter.is_value_type() {
        return Ok(argument);
    }

    Expr::typed_constant(Value::Nil, parameter)
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        runtime::{Domain, MethodDecl, TypeMeta, Value},
        semantics::ReduceError,
        symbols::{DispatchKind, SymbolTable},
        tree::{Expr, ExprKind},
    };

    fn table() -> SymbolTable {
        let _ = SymbolTable::root();

        SymbolTable::new(Vec::new())
    }

    fn method_call(receiver: Expr, name: &str, arguments: Vec<Expr>) -> Expr {
        Expr::dispatch(DispatchKind::METHOD, Some(receiver), name, Vec::new(), arguments)
    }

    #[test]
    fn test_overload_selection() {
        let assembly = Domain::get().define_assembly("reflect_tests", Version::new(1, 0, 0));

        let printer = assembly.build_type("Printer").build();

        let _ = printer.define_method(
            MethodDecl::function("print", |_| Ok(Value::from("int")))
                .parameter("value", TypeMeta::int32())
                .returns(TypeMeta::string()),
        );

        let _ = printer.define_method(
            MethodDecl::function("print", |_| Ok(Value::from("string")))
                .parameter("value", TypeMeta::string())
                .returns(TypeMeta::string()),
        );

        let _ = printer.define_method(
            MethodDecl::function("print", |_| Ok(Value::from("object")))
                .parameter("value", TypeMeta::object())
                .returns(TypeMeta::string()),
        );

        let table = table();
        let receiver = Expr::type_candidate(printer);

        let signature = |argument: Expr| {
            let reduced = method_call(receiver.clone(), "print", vec![argument])
                .reduce(&table, None)
                .unwrap();

            match reduced.kind() {
                ExprKind::Call(node) => node.method.parameters()[0].ty,
                _ => panic!("unexpected result {reduced}"),
            }
        };

        assert_eq!(signature(Expr::constant(1)), TypeMeta::int32());
        assert_eq!(signature(Expr::constant("a")), TypeMeta::string());
        assert_eq!(signature(Expr::constant(1.5)), TypeMeta::object());
    }

    #[test]
    fn test_ambiguous_overloads() {
        let assembly = Domain::get().define_assembly("reflect_tests", Version::new(1, 0, 0));

        let node = assembly.build_type("Node").build();

        let _ = node.define_method(
            MethodDecl::function("link", |_| Ok(Value::Nil))
                .parameter("a", node)
                .parameter("b", TypeMeta::object()),
        );

        let _ = node.define_method(
            MethodDecl::function("link", |_| Ok(Value::Nil))
                .parameter("a", TypeMeta::object())
                .parameter("b", node),
        );

        let table = table();

        let a = Expr::parameter("a", node);
        let b = Expr::parameter("b", node);

        let result = method_call(Expr::type_candidate(node), "link", vec![a, b]).reduce(&table, None);

        assert!(matches!(
            result,
            Err(ReduceError::AmbiguousMatch { candidates: 2, .. }),
        ));
    }

    #[test]
    fn test_lambda_argument() {
        let assembly = Domain::get().define_assembly("reflect_tests", Version::new(1, 0, 0));

        let mapper = assembly.build_type("Mapper").build();
        let function = TypeMeta::function(&[TypeMeta::int32()], TypeMeta::int32()).unwrap();

        let _ = mapper.define_method(
            MethodDecl::function("map", |_| Ok(Value::I32(0)))
                .parameter("f", function)
                .returns(TypeMeta::int32()),
        );

        let table = table();

        let x = Expr::ambiguous_parameter("x", None);
        let lambda = Expr::ambiguous_lambda(vec![x], Expr::ident("x"), None).unwrap();

        let reduced = method_call(Expr::type_candidate(mapper), "map", vec![lambda])
            .reduce(&table, None)
            .unwrap();

        let ExprKind::Call(node) = reduced.kind() else {
            panic!("unexpected result {reduced}");
        };

        assert_eq!(node.arguments[0].ty(), Some(function));
    }

    #[test]
    fn test_constructor_and_extension() {
        let assembly = Domain::get().define_assembly("reflect_tests", Version::new(1, 0, 0));

        let counter = assembly.build_type("Counter").build();

        let _ = counter.define_method(
            MethodDecl::constructor(move |_| Ok(Value::new_object(counter))).parameter("start", TypeMeta::int32()),
        );

        let _ = counter.define_method(
            MethodDecl::function("twice", |_| Ok(Value::I32(0)))
                .parameter("this", counter)
                .returns(TypeMeta::int32()),
        );

        let table = table();

        let created = Expr::dispatch(
            DispatchKind::CONSTRUCTOR,
            Some(Expr::type_candidate(counter)),
            "new",
            Vec::new(),
            vec![Expr::constant(3)],
        )
        .reduce(&table, None)
        .unwrap();

        assert_eq!(created.ty(), Some(counter));
        assert!(matches!(created.kind(), ExprKind::New(..)));

        let receiver = Expr::parameter("c", counter);

        let extension = Expr::dispatch(
            DispatchKind::METHOD | DispatchKind::EXTENSION,
            Some(receiver.clone()),
            "twice",
            Vec::new(),
            Vec::new(),
        )
        .reduce(&table, None)
        .unwrap();

        let ExprKind::Call(node) = extension.kind() else {
            panic!("unexpected result {extension}");
        };

        assert!(node.extension);
        assert!(node.arguments[0].ptr_eq(&receiver));

        let plain = method_call(receiver, "twice", Vec::new()).reduce(&table, None);

        assert!(matches!(plain, Err(ReduceError::Unresolved { .. })));
    }
}
