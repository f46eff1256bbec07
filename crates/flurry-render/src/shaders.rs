//! Built-in WGSL programs for both motion models

use flurry_core::{MotionModel, ShaderSources};

/// Vertex stage for CPU-positioned quads
pub const QUAD_VERTEX_SHADER: &str = include_str!("quad_shader.wgsl");

/// Vertex stage that displaces write-once quads by elapsed time
pub const TIMED_QUAD_VERTEX_SHADER: &str = include_str!("timed_quad_shader.wgsl");

/// Fragment stage shared by both models
pub const FLAKE_FRAGMENT_SHADER: &str = include_str!("flake_shader.wgsl");

/// The program pair matching `motion`'s vertex layout
pub fn builtin_shaders(motion: MotionModel) -> ShaderSources {
    let vertex = match motion {
        MotionModel::Cpu => QUAD_VERTEX_SHADER,
        MotionModel::Gpu => TIMED_QUAD_VERTEX_SHADER,
    };
    ShaderSources::new(vertex, FLAKE_FRAGMENT_SHADER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use naga::{BinaryOperator, Expression, Function, Handle, Literal};

    fn value(function: &Function, handle: Handle<Expression>) -> &Expression {
        match &function.expressions[handle] {
            Expression::Load { pointer } => &function.expressions[*pointer],
            other => other,
        }
    }

    // Velocity is in pixels per 100 ms, matching the CPU integration step
    #[test]
    fn timed_vertex_stage_scales_elapsed_by_hundred_ms() {
        let module = naga::front::wgsl::parse_str(TIMED_QUAD_VERTEX_SHADER).unwrap();
        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == "vs_main")
            .unwrap();
        let function = &entry.function;

        let elapsed = function.expressions.iter().find_map(|(_, expr)| match expr {
            Expression::Binary {
                op: BinaryOperator::Divide,
                left,
                right,
            } if matches!(
                function.expressions[*right],
                Expression::Literal(Literal::F32(v)) if v == 100.0
            ) =>
            {
                Some(*left)
            }
            _ => None,
        });
        let elapsed = elapsed.expect("no division by 100 ms in vs_main");

        let Expression::Binary {
            op: BinaryOperator::Subtract,
            left: now,
            right: spawn,
        } = value(function, elapsed)
        else {
            panic!("elapsed is not a time difference");
        };

        let Expression::AccessIndex { base, index: 1 } = value(function, *now) else {
            panic!("minuend is not frame.time_ms");
        };
        let Expression::GlobalVariable(global) = function.expressions[*base] else {
            panic!("minuend does not read a uniform");
        };
        assert_eq!(module.global_variables[global].name.as_deref(), Some("frame"));

        let Expression::AccessIndex { base, index: 2 } = value(function, *spawn) else {
            panic!("subtrahend is not input.spawn_time");
        };
        assert!(matches!(
            function.expressions[*base],
            Expression::FunctionArgument(0)
        ));
    }
}
