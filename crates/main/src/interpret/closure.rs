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

use std::sync::Arc;

use crate::{
    interpret::{engine::declare, frame::Frame},
    runtime::{RuntimeError, RuntimeResult, ScriptCallable, TypeMeta, Value},
    tree::LambdaExpr,
};

// A function value created by the evaluation of a Lambda expression.
//
// Each call binds the arguments in a fresh child frame of the frame the
// lambda was evaluated in.
pub(super) struct Closure {
    lambda: LambdaExpr,
    frame: Arc<Frame>,
}

impl ScriptCallable for Closure {
    #[inline(always)]
    fn ty(&self) -> &'static TypeMeta {
        self.lambda.ty
    }

    fn call(&self, arguments: &[Value]) -> RuntimeResult<Value> {
        if arguments.len() != self.lambda.parameters.len() {
            return Err(RuntimeError::ArityMismatch {
                parameters: self.lambda.parameters.len(),
                arguments: arguments.len(),
            });
        }

        let scope = self.frame.child();

        for (parameter, argument) in self.lambda.parameters.iter().zip(arguments) {
            declare(&scope, parameter, Some(argument.clone()))?;
        }

        let result = self.lambda.body.eval(&scope)?;

        match self.lambda.ret().is_void() {
            true => Ok(Value::Nil),
            false => Ok(result),
        }
    }
}

impl Closure {
    #[inline(always)]
    pub(super) fn new(lambda: LambdaExpr, frame: Arc<Frame>) -> Self {
        Self { lambda, frame }
    }
}
