use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferUsages, ComputePipeline,
    PipelineCompilationOptions, PipelineLayoutDescriptor, ShaderStages, TextureSampleType,
    TextureViewDimension,
};

use super::tiles::TilePlan;
use super::types::{ReduceUniforms, ZoneSum};
use super::{GpuContext, RenderError};
use crate::capture::FrameSource;
use crate::zones::{RawColor, ZoneCollection};

const SHADER_SOURCE: &str = include_str!("shaders/tile_reduce.wgsl");

/// Buffers sized for one zone count and frame size. Rebuilt wholesale,
/// never resized in place.
struct ZoneBuffers {
    zone_count: usize,
    plan: TilePlan,
    zones: Buffer,
    tiles: Buffer,
    results: Buffer,
    readback: Buffer,
}

/// Averages every zone rectangle of the two eye images on the GPU.
///
/// Each eye is processed by a gather dispatch over
/// `max_tiles_x * max_tiles_y * zones_per_eye` workgroups followed by a
/// combine dispatch of one workgroup per zone. Both eyes write into the same
/// result buffer, left zones first.
pub struct TileReducer {
    gpu: GpuContext,
    bind_group_layout: BindGroupLayout,
    gather: ComputePipeline,
    combine: ComputePipeline,
    /// One uniform buffer per eye so both dispatch pairs fit in one submit.
    uniforms: [Buffer; 2],
    buffers: Option<ZoneBuffers>,
    frame_index: u64,
}

impl TileReducer {
    /// Acquire a device and compile both kernels.
    pub fn new() -> Result<Self, RenderError> {
        let gpu = GpuContext::new()?;
        let device = &gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("tile-reduce-bgl"),
            entries: &[
                // binding 0: per-eye params
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // binding 1: eye image
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // binding 2: zones (read)
                storage_entry(2, true),
                // binding 3: tile partials
                storage_entry(3, false),
                // binding 4: per-zone results
                storage_entry(4, false),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tile-reduce"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("tile-reduce-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let gather = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("tile-gather-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("gather"),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });

        let combine = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("tile-combine-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("combine"),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Kernel {
                kernel: "tile_reduce",
                message: err.to_string(),
            });
        }

        let uniforms = [0, 1].map(|eye| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if eye == 0 {
                    "tile-reduce-params-left"
                } else {
                    "tile-reduce-params-right"
                }),
                size: std::mem::size_of::<ReduceUniforms>() as u64,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Ok(Self {
            gpu,
            bind_group_layout,
            gather,
            combine,
            uniforms,
            buffers: None,
            frame_index: 0,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Average every zone of the current frame into `zones.colors_mut()`.
    ///
    /// A capture failure skips the frame; the caller decides whether to
    /// retry next iteration.
    pub fn render(
        &mut self,
        zones: &mut ZoneCollection,
        source: &mut dyn FrameSource,
    ) -> Result<(), RenderError> {
        let frames = source.acquire_eyes(&self.gpu)?;
        let frame_size = frames.frame_size()?;

        if zones.is_empty() {
            return Ok(());
        }

        let stale = match &self.buffers {
            Some(b) => b.zone_count != zones.len() || b.plan.frame_size != frame_size,
            None => true,
        };
        if stale || zones.is_dirty() {
            self.buffers = Some(self.create_buffers(zones, frame_size));
            zones.clear_dirty();
        }
        self.frame_index += 1;

        let Some(buffers) = &self.buffers else {
            return Ok(());
        };

        let half = zones.half() as u32;
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;

        let eyes = [&frames.left, &frames.right];
        let mut bind_groups: Vec<BindGroup> = Vec::with_capacity(2);
        for (eye, texture) in eyes.into_iter().enumerate() {
            let params = ReduceUniforms {
                frame_size: [frame_size.0, frame_size.1],
                zone_count: half,
                zone_start: half * eye as u32,
            };
            queue.write_buffer(&self.uniforms[eye], 0, bytemuck::bytes_of(&params));

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            bind_groups.push(device.create_bind_group(&BindGroupDescriptor {
                label: Some("tile-reduce-bg"),
                layout: &self.bind_group_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: self.uniforms[eye].as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: buffers.zones.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 3,
                        resource: buffers.tiles.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 4,
                        resource: buffers.results.as_entire_binding(),
                    },
                ],
            }));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tile-reduce-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("tile-reduce-pass"),
                timestamp_writes: None,
            });
            for bind_group in &bind_groups {
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_pipeline(&self.gather);
                pass.dispatch_workgroups(buffers.plan.max_tiles_x, buffers.plan.max_tiles_y, half);
                pass.set_pipeline(&self.combine);
                pass.dispatch_workgroups(1, 1, half);
            }
        }

        let result_bytes = results_size(zones.len());
        encoder.copy_buffer_to_buffer(&buffers.results, 0, &buffers.readback, 0, result_bytes);
        queue.submit(std::iter::once(encoder.finish()));

        let result = read_results(device, &buffers.readback, zones.colors_mut());
        if result.is_err() {
            // a readback buffer left mid-map is unusable; rebuild next frame
            self.buffers = None;
        }
        result
    }

    fn create_buffers(&self, zones: &ZoneCollection, frame_size: (u32, u32)) -> ZoneBuffers {
        let device = &self.gpu.device;
        let plan = TilePlan::build(zones.rects(), frame_size.0, frame_size.1);

        log::debug!(
            "Rebuilding zone buffers: {} zones, {} tiles, grid {}x{} at {}x{}",
            zones.len(),
            plan.total_tiles,
            plan.max_tiles_x,
            plan.max_tiles_y,
            frame_size.0,
            frame_size.1
        );

        let zone_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("zone-rects"),
            contents: bytemuck::cast_slice(&plan.zones),
            usage: BufferUsages::STORAGE,
        });

        let tiles = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zone-tiles"),
            size: u64::from(plan.total_tiles.max(1)) * std::mem::size_of::<ZoneSum>() as u64,
            usage: BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let results = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zone-results"),
            size: results_size(zones.len()),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zone-readback"),
            size: results_size(zones.len()),
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        ZoneBuffers {
            zone_count: zones.len(),
            plan,
            zones: zone_buffer,
            tiles,
            results,
            readback,
        }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn results_size(zone_count: usize) -> u64 {
    (zone_count * std::mem::size_of::<ZoneSum>()) as u64
}

/// Block until the readback buffer maps, then copy averages out.
fn read_results(
    device: &wgpu::Device,
    readback: &Buffer,
    colors: &mut [RawColor],
) -> Result<(), RenderError> {
    let slice = readback.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::Readback(err.to_string()));
    }
    if let Err(e) = device.poll(wgpu::PollType::wait_indefinitely()) {
        readback.unmap();
        return Err(RenderError::Readback(e.to_string()));
    }

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(RenderError::Readback(e.to_string())),
        Err(e) => return Err(RenderError::Readback(e.to_string())),
    }

    {
        let mapped = slice.get_mapped_range();
        let sums: &[ZoneSum] = bytemuck::cast_slice(&mapped);
        for (color, sum) in colors.iter_mut().zip(sums) {
            *color = RawColor::new(
                f64::from(sum.rgb[0]),
                f64::from(sum.rgb[1]),
                f64::from(sum.rgb[2]),
            );
        }
    }
    readback.unmap();
    Ok(())
}
