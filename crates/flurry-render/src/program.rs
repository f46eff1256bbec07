//! Draw program: WGSL compilation, linking and validation through naga, then
//! the wgpu pipeline built from the linked stages

use flurry_core::{FlurryError, Result, ShaderStage, VertexLayout};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::collections::BTreeSet;

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

const TIMED_QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32, 3 => Float32x2];

/// Vertex attributes for `layout`, packed in declaration order
pub fn vertex_attributes(layout: VertexLayout) -> &'static [wgpu::VertexAttribute] {
    match layout {
        VertexLayout::PositionTexCoord => &QUAD_ATTRIBUTES,
        VertexLayout::PositionVelocityTime => &TIMED_QUAD_ATTRIBUTES,
    }
}

/// One parsed shader stage
#[derive(Debug)]
pub struct CompiledStage {
    pub source: String,
    pub module: naga::Module,
}

/// Parse WGSL for `stage`. The error log is the compiler's annotated output.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| FlurryError::ShaderCompile {
        stage,
        log: e.emit_to_string(source),
    })?;
    Ok(CompiledStage {
        source: source.to_string(),
        module,
    })
}

/// Stages attached so far. Attaching a stage again replaces it.
#[derive(Default)]
pub struct AttachedStages {
    vertex: Option<CompiledStage>,
    fragment: Option<CompiledStage>,
}

impl AttachedStages {
    pub fn attach(&mut self, stage: ShaderStage, compiled: CompiledStage) {
        match stage {
            ShaderStage::Vertex => self.vertex = Some(compiled),
            ShaderStage::Fragment => self.fragment = Some(compiled),
        }
    }

    fn get(&self, stage: ShaderStage) -> Result<&CompiledStage> {
        let attached = match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        };
        attached
            .as_ref()
            .ok_or_else(|| FlurryError::Link(format!("no {stage} stage attached")))
    }
}

/// Entry points and layout that a pipeline is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProgram {
    pub layout: VertexLayout,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

fn entry_point(compiled: &CompiledStage, stage: ShaderStage) -> Result<&naga::EntryPoint> {
    compiled
        .module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage(stage))
        .ok_or_else(|| FlurryError::Link(format!("{stage} stage has no @{stage} entry point")))
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        out.insert(*location);
                    }
                }
            }
        }
    }
}

fn input_locations(module: &naga::Module, ep: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    for arg in &ep.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn output_locations(module: &naga::Module, ep: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    if let Some(result) = &ep.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

/// Match the stages against each other and against `layout`: vertex inputs
/// must be exactly the layout's attribute locations, and every fragment input
/// must be written by the vertex stage.
pub fn link(stages: &AttachedStages, layout: VertexLayout) -> Result<LinkedProgram> {
    let vertex = stages.get(ShaderStage::Vertex)?;
    let fragment = stages.get(ShaderStage::Fragment)?;
    let vs = entry_point(vertex, ShaderStage::Vertex)?;
    let fs = entry_point(fragment, ShaderStage::Fragment)?;

    let expected: BTreeSet<u32> = vertex_attributes(layout)
        .iter()
        .map(|a| a.shader_location)
        .collect();
    let inputs = input_locations(&vertex.module, vs);
    if inputs != expected {
        return Err(FlurryError::Link(format!(
            "vertex inputs at locations {inputs:?} do not match {layout:?} locations {expected:?}"
        )));
    }

    let varyings = output_locations(&vertex.module, vs);
    let missing: Vec<_> = input_locations(&fragment.module, fs)
        .difference(&varyings)
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(FlurryError::Link(format!(
            "fragment inputs at locations {missing:?} are not written by the vertex stage"
        )));
    }

    Ok(LinkedProgram {
        layout,
        vertex_entry: vs.name.clone(),
        fragment_entry: fs.name.clone(),
    })
}

/// Run naga's validator over both attached stages
pub fn validate(stages: &AttachedStages) -> Result<()> {
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let compiled = stages.get(stage)?;
        Validator::new(ValidationFlags::all(), Capabilities::empty())
            .validate(&compiled.module)
            .map_err(|e| FlurryError::Validate(format!("{stage} stage: {e}")))?;
    }
    Ok(())
}

/// Linked pipeline plus the layout it was linked for
pub struct Program {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: VertexLayout,
}

/// Build the render pipeline: premultiplied alpha blending, no depth, one
/// vertex buffer with `linked.layout`'s stride.
pub fn create_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    stages: &AttachedStages,
    linked: &LinkedProgram,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> Result<Program> {
    let vertex = stages.get(ShaderStage::Vertex)?;
    let fragment = stages.get(ShaderStage::Fragment)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Flurry Vertex Shader"),
        source: wgpu::ShaderSource::Wgsl(vertex.source.as_str().into()),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Flurry Fragment Shader"),
        source: wgpu::ShaderSource::Wgsl(fragment.source.as_str().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Flurry Pipeline Layout"),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Flurry Quad Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(&linked.vertex_entry),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: linked.layout.stride_bytes() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: vertex_attributes(linked.layout),
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(&linked.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(FlurryError::Link(err.to_string()));
    }

    Ok(Program {
        pipeline,
        layout: linked.layout,
    })
}
