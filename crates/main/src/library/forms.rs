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

use compact_str::CompactString;

use crate::{
    library::{define, site_of},
    runtime::{TypeMeta, CONSTRUCTOR_NAME},
    semantics::{ReduceError, ReduceResult},
    symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
    tree::{
        executable,
        expect_assignable,
        CatchBlock,
        Expr,
        ExprKind,
        TypeBinaryOperator,
        UnaryOperator,
    },
};

pub(super) fn define_forms(table: &SymbolTable) {
    form(table, "let", let_form);
    form(table, "fn", fn_form);
    form(table, "macro", macro_form);
    form(table, "do", do_form);
    form(table, "if", if_form);
    form(table, "try", try_form);
    form(table, ".", member_form);
    form(table, "new", new_form);
    form(table, "throw", throw_form);
    form(table, "is", is_form);
    form(table, "as", as_form);
    form(table, "cast", cast_form);
}

type Form = fn(&[Expr], &SymbolTable, Option<&'static TypeMeta>) -> ReduceResult<Expr>;

#[inline(always)]
fn form(table: &SymbolTable, name: &'static str, reduce: Form) {
    define(
        table,
        SymbolEntry::global(DispatchKind::METHOD, name),
        SymbolDefinition::new(move |site, table, expected| {
            reduce(&site_of(site)?.arguments, table, expected)
        }),
    );
}

// (let name value body...)
// (let (name Type) value body...)
fn let_form(
    arguments: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [name, value, body @ ..] = arguments else {
        return Err(arity(3, arguments, "let"));
    };

    if body.is_empty() {
        return Err(arity(3, arguments, "let"));
    }

    let (name, declared) = binding(name, table)?;

    let value = value.reduce(table, declared)?;

    let scope = table.child();
    let entry = SymbolEntry::global(DispatchKind::NONE, name.clone());

    if value.is_reducible() {
        scope.add(entry, SymbolDefinition::variable(value))?;

        return block(sequence(body, &scope, expected)?);
    }

    let value = match declared {
        Some(declared) => convert_numeric(value, declared)?,
        None => value,
    };

    let ty = match declared {
        Some(declared) => {
            let _ = expect_assignable(declared, &value, "let value")?;

            declared
        }

        None => executable(&value, "let value")?,
    };

    if ty.is_void() {
        return Err(ReduceError::TypeMismatch {
            expected: None,
            actual: Some(ty),
            context: "let value",
        });
    }

    let variable = Expr::parameter(name, ty);

    scope.add(entry, SymbolDefinition::variable(variable.clone()))?;

    let mut expressions = Vec::with_capacity(body.len() + 1);

    expressions.push(Expr::assign(variable.clone(), value)?);
    expressions.append(&mut sequence(body, &scope, expected)?);

    Expr::block(vec![variable], expressions)
}

// (fn [params] body...)
fn fn_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [parameters, body @ ..] = arguments else {
        return Err(arity(2, arguments, "fn"));
    };

    let parameters = parameter_list(parameters, table)?;

    let body = match body {
        [] => return Err(arity(2, arguments, "fn")),
        [single] => single.clone(),
        _ => Expr::dispatch(DispatchKind::METHOD, None, "do", Vec::new(), body.to_vec()),
    };

    Expr::ambiguous_lambda(parameters, body, None)
}

// (macro [params] body...)
fn macro_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [parameters, body @ ..] = arguments else {
        return Err(arity(2, arguments, "macro"));
    };

    let parameters = parameter_list(parameters, table)?;

    let body = match body {
        [] => return Err(arity(2, arguments, "macro")),
        [single] => single.clone(),
        _ => Expr::dispatch(DispatchKind::METHOD, None, "do", Vec::new(), body.to_vec()),
    };

    Expr::macro_expr(parameters, body)
}

fn do_form(
    arguments: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    if arguments.is_empty() {
        return Ok(Expr::default(TypeMeta::void()));
    }

    block(sequence(arguments, &table.child(), expected)?)
}

// (if test then)
// (if test then else)
fn if_form(
    arguments: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    match arguments {
        [test, if_true] => {
            let test = test.reduce_value(table, Some(TypeMeta::boolean()))?;
            let if_true = if_true.reduce_value(table, None)?;

            Expr::condition_typed(
                test,
                if_true,
                Expr::default(TypeMeta::void()),
                TypeMeta::void(),
            )
        }

        [test, if_true, if_false] => {
            let test = test.reduce_value(table, Some(TypeMeta::boolean()))?;
            let if_true = if_true.reduce_value(table, expected)?;
            let if_false = if_false.reduce_value(table, expected.or(if_true.ty()))?;

            Expr::condition(test, if_true, if_false)
        }

        _ => Err(arity(3, arguments, "if")),
    }
}

// (try body (catch Type handler...) (catch (name Type) handler...) (finally cleanup...))
fn try_form(
    arguments: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [body, clauses @ ..] = arguments else {
        return Err(arity(2, arguments, "try"));
    };

    let body = body.reduce_value(&table.child(), expected)?;
    let ty = executable(&body, "try body")?;

    let mut handlers = Vec::new();
    let mut finally = None;

    for clause in clauses {
        let Some((head, rest)) = clause_of(clause) else {
            return Err(malformed(clause, "expected catch or finally clause"));
        };

        match head {
            "catch" => {
                let [test, handler @ ..] = rest else {
                    return Err(arity(1, rest, "catch clause"));
                };

                let scope = table.child();

                let (test, variable) = match test.kind() {
                    ExprKind::List(..) => {
                        let (name, declared) = binding(test, table)?;
                        let test = declared.unwrap_or(TypeMeta::exception());
                        let variable = Expr::parameter(name.clone(), test);

                        scope.add(
                            SymbolEntry::global(DispatchKind::NONE, name),
                            SymbolDefinition::variable(variable.clone()),
                        )?;

                        (test, Some(variable))
                    }

                    _ => (type_of(test, table, "catch type")?, None),
                };

                let body = match handler.is_empty() {
                    true => Expr::default(ty),
                    false => block(sequence(handler, &scope, Some(ty).filter(|ty| !ty.is_void()))?)?,
                };

                handlers.push(CatchBlock {
                    test,
                    variable,
                    filter: None,
                    body,
                });
            }

            "finally" if finally.is_none() => {
                finally = Some(do_form(rest, table, None)?);
            }

            _ => return Err(malformed(clause, "expected catch or finally clause")),
        }
    }

    Expr::try_catch(body, handlers, finally, None)
}

// (. receiver Name)
// (. receiver Name args...)
// (. receiver (Name args...))
fn member_form(
    arguments: &[Expr],
    _table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [receiver, member, rest @ ..] = arguments else {
        return Err(arity(2, arguments, "member access"));
    };

    let method = DispatchKind::METHOD | DispatchKind::EXTENSION;

    match member.kind() {
        ExprKind::Ident(node) if rest.is_empty() => Ok(Expr::dispatch(
            DispatchKind::MEMBER,
            Some(receiver.clone()),
            node.name.clone(),
            Vec::new(),
            Vec::new(),
        )),

        ExprKind::Ident(node) => Ok(Expr::dispatch(
            method,
            Some(receiver.clone()),
            node.name.clone(),
            Vec::new(),
            rest.to_vec(),
        )),

        ExprKind::List(node) if rest.is_empty() => {
            let Some((ExprKind::Ident(head), arguments)) =
                node.elements.split_first().map(|(head, tail)| (head.kind(), tail))
            else {
                return Err(malformed(member, "expected method name"));
            };

            Ok(Expr::dispatch(
                method,
                Some(receiver.clone()),
                head.name.clone(),
                Vec::new(),
                arguments.to_vec(),
            ))
        }

        _ => Err(malformed(member, "expected member name")),
    }
}

// (new Type args...)
fn new_form(
    arguments: &[Expr],
    _table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [ty, arguments @ ..] = arguments else {
        return Err(arity(1, arguments, "new"));
    };

    Ok(Expr::dispatch(
        DispatchKind::CONSTRUCTOR,
        Some(ty.clone()),
        CONSTRUCTOR_NAME,
        Vec::new(),
        arguments.to_vec(),
    ))
}

fn throw_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [value] = arguments else {
        return Err(arity(1, arguments, "throw"));
    };

    Expr::throw(value.reduce_value(table, None)?)
}

// (is value Type)
fn is_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [value, ty] = arguments else {
        return Err(arity(2, arguments, "is"));
    };

    let ty = type_of(ty, table, "is")?;

    Expr::type_binary(TypeBinaryOperator::TypeIs, value.reduce_value(table, None)?, ty)
}

// (as value Type)
fn as_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [value, ty] = arguments else {
        return Err(arity(2, arguments, "as"));
    };

    let ty = type_of(ty, table, "as")?;

    Expr::unary_typed(UnaryOperator::TypeAs, value.reduce_value(table, None)?, ty)
}

// (cast Type value)
fn cast_form(
    arguments: &[Expr],
    table: &SymbolTable,
    _expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let [ty, value] = arguments else {
        return Err(arity(2, arguments, "cast"));
    };

    let ty = type_of(ty, table, "cast")?;
    let value = value.reduce_value(table, Some(ty))?;

    match value.ty() == Some(ty) {
        true => Ok(value),
        false => Expr::convert(value, ty),
    }
}

// Reduces each expression to a value. The last one receives the expected
// type.
fn sequence(
    expressions: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Vec<Expr>> {
    let mut result = Vec::with_capacity(expressions.len());

    for (index, expression) in expressions.iter().enumerate() {
        let hint = match index + 1 == expressions.len() {
            true => expected,
            false => None,
        };

        result.push(expression.reduce_value(table, hint)?);
    }

    Ok(result)
}

fn block(mut expressions: Vec<Expr>) -> ReduceResult<Expr> {
    if expressions.len() == 1 {
        if let Some(single) = expressions.pop() {
            return Ok(single);
        }
    }

    Expr::block(Vec::new(), expressions)
}

// A name with an optional type: `name`, `(name Type)`, or an
// AmbiguousParameter.
fn binding(
    expr: &Expr,
    table: &SymbolTable,
) -> ReduceResult<(CompactString, Option<&'static TypeMeta>)> {
    match expr.kind() {
        ExprKind::Ident(node) => Ok((node.name.clone(), None)),

        ExprKind::AmbiguousParameter(node) => Ok((node.name.clone(), node.ty)),

        ExprKind::List(node) => match node.elements.as_slice() {
            [name, ty] => match name.kind() {
                ExprKind::Ident(name) => {
                    Ok((name.name.clone(), Some(type_of(ty, table, "binding type")?)))
                }

                _ => Err(malformed(expr, "expected binding name")),
            },

            _ => Err(malformed(expr, "expected (name Type) binding")),
        },

        _ => Err(malformed(expr, "expected binding name")),
    }
}

fn parameter_list(expr: &Expr, table: &SymbolTable) -> ReduceResult<Vec<Expr>> {
    let ExprKind::Vector(node) = expr.kind() else {
        return Err(malformed(expr, "expected parameter vector"));
    };

    let mut parameters = Vec::with_capacity(node.elements.len());

    for element in &node.elements {
        let (name, ty) = binding(element, table)?;

        parameters.push(Expr::ambiguous_parameter(name, ty));
    }

    Ok(parameters)
}

fn type_of(expr: &Expr, table: &SymbolTable, context: &'static str) -> ReduceResult<&'static TypeMeta> {
    let reduced = expr.reduce(table, None)?;

    match reduced.kind() {
        ExprKind::TypeCandidate(node) => Ok(node.target),

        _ => Err(ReduceError::TypeMismatch {
            expected: Some(TypeMeta::ty()),
            actual: reduced.ty(),
            context,
        }),
    }
}

fn clause_of(expr: &Expr) -> Option<(&str, &[Expr])> {
    let ExprKind::List(node) = expr.kind() else {
        return None;
    };

    let (head, rest) = node.elements.split_first()?;

    match head.kind() {
        ExprKind::Ident(head) => Some((head.name.as_str(), rest)),
        _ => None,
    }
}

fn convert_numeric(value: Expr, target: &'static TypeMeta) -> ReduceResult<Expr> {
    match value.ty() {
        Some(ty) if ty != target && ty.is_numeric() && target.is_numeric() => Expr::convert(value, target),
        _ => Ok(value),
    }
}

#[inline(always)]
fn arity(expected: usize, arguments: &[Expr], context: &'static str) -> ReduceError {
    ReduceError::ArityMismatch {
        expected,
        actual: arguments.len(),
        context,
    }
}

#[inline(always)]
fn malformed(expr: &Expr, message: &'static str) -> ReduceError {
    ReduceError::Malformed {
        kind: expr.name(),
        message: CompactString::new(message),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::{TypeMeta, Value},
        semantics::ReduceError,
        symbols::SymbolTable,
        tree::Expr,
    };

    fn reduce(expr: Expr) -> Result<Expr, ReduceError> {
        let table = SymbolTable::new(vec![SymbolTable::root().clone()]);

        expr.reduce_value(&table, None)
    }

    fn ident(name: &str) -> Expr {
        Expr::ident(name)
    }

    #[test]
    fn test_typed_let() {
        // (let (total Double) 1 (+ total 0.5))
        let program = Expr::list(vec![
            ident("let"),
            Expr::list(vec![ident("total"), ident("Double")]),
            Expr::constant(1),
            Expr::list(vec![ident("+"), ident("total"), Expr::constant(0.5)]),
        ]);

        let reduced = reduce(program).unwrap();

        assert_eq!(reduced.ty(), Some(TypeMeta::double()));
        assert_eq!(reduced.evaluate().unwrap(), Value::F64(1.5));

        // (let x 1)
        let program = Expr::list(vec![ident("let"), ident("x"), Expr::constant(1)]);

        assert!(matches!(
            reduce(program),
            Err(ReduceError::ArityMismatch { expected: 3, actual: 2, .. }),
        ));
    }

    #[test]
    fn test_try_form() {
        // (try
        //     (do (throw (new Exception "boom")) "unreachable")
        //     (catch (e Exception) (. e Message)))
        let program = Expr::list(vec![
            ident("try"),
            Expr::list(vec![
                ident("do"),
                Expr::list(vec![
                    ident("throw"),
                    Expr::list(vec![ident("new"), ident("Exception"), Expr::constant("boom")]),
                ]),
                Expr::constant("unreachable"),
            ]),
            Expr::list(vec![
                ident("catch"),
                Expr::list(vec![ident("e"), ident("Exception")]),
                Expr::list(vec![ident("."), ident("e"), ident("Message")]),
            ]),
        ]);

        let reduced = reduce(program).unwrap();

        assert_eq!(reduced.evaluate().unwrap(), Value::from("boom"));
    }

    #[test]
    fn test_one_armed_if() {
        // (let n 0 (if (< n 1) (= n 10)) n)
        let program = Expr::list(vec![
            ident("let"),
            ident("n"),
            Expr::constant(0),
            Expr::list(vec![
                ident("if"),
                Expr::list(vec![ident("<"), ident("n"), Expr::constant(1)]),
                Expr::list(vec![ident("="), ident("n"), Expr::constant(10)]),
            ]),
            ident("n"),
        ]);

        assert_eq!(reduce(program).unwrap().evaluate().unwrap(), Value::I32(10));
    }

    #[test]
    fn test_type_forms_reject_values() {
        // (is 1 2)
        let program = Expr::list(vec![ident("is"), Expr::constant(1), Expr::constant(2)]);

        assert!(matches!(
            reduce(program),
            Err(ReduceError::TypeMismatch { context: "is", .. }),
        ));
    }
}
