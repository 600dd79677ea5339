//! The export pass: hair objects in, renderer nodes out.
//!
//! Per object, strands are sampled for every deform key, a master is picked
//! for each strand, and every master instance is bent onto its strand key by
//! key. Strands of a key are independent and may be bent in parallel.

use std::sync::Arc;

use rayon::prelude::*;
use strix_math::{Mat4, Vec3};

use crate::assign::jitter_rng;
use crate::attribute::{AttributeArray, AttributeKind, AttributeScope, AttributeValue, UserAttribute};
use crate::cache::CacheKey;
use crate::context::{ExportContext, ExportStats};
use crate::error::{ExportError, ExportResult, StrandError};
use crate::hair::{HairBuildOptions, InstancingSettings};
use crate::instance::{is_cacheable_master, resolve_master, BentShape, MasterInstances};
use crate::mesh::ShapeKind;
use crate::motion::{MotionBlurSampler, MotionSamples};
use crate::nesting::{dependency_order, walk_hierarchy};
use crate::output::{
    catmull_rom_points, CurveBasis, CurveGeometry, KeyedBuffer, NodeBatch, NodeDesc, NodeGeometry,
    NodeSink,
};
use crate::provider::{AttributeProvider, MasterShapeProvider, ObjectId};

/// Export every hair object of `scene` into `sink`.
///
/// A failing object is logged and counted, and the pass moves on. Only an
/// abort ends the pass early; nodes of the object in flight are destroyed.
pub fn export_frame<S, N>(
    ctx: &mut ExportContext,
    scene: &S,
    sink: &mut N,
) -> ExportResult<ExportStats>
where
    S: MasterShapeProvider + AttributeProvider + ?Sized,
    N: NodeSink,
{
    let objects = export_order(ctx, scene);
    log::info!(
        "Exporting {} hair objects at frame {}",
        objects.len(),
        ctx.config.frame
    );

    for id in objects {
        if ctx.abort.is_aborted() {
            log::warn!("Export aborted before {}", id);
            ctx.sync_cache_stats();
            return Err(ExportError::Aborted);
        }

        match export_object(ctx, scene, sink, id) {
            Ok(nodes) => {
                ctx.stats.objects_exported += 1;
                ctx.stats.nodes += nodes;
            }
            Err(e) => {
                log::error!("Failed to export {}: {}", object_name(scene, id), e);
                ctx.stats.objects_failed += 1;
            }
        }
    }

    ctx.sync_cache_stats();
    log::info!(
        "Exported {} objects ({} failed), {} strands, {} nodes; cache {} computed / {} reused",
        ctx.stats.objects_exported,
        ctx.stats.objects_failed,
        ctx.stats.strands,
        ctx.stats.nodes,
        ctx.stats.cache_computations,
        ctx.stats.cache_hits
    );
    Ok(ctx.stats.clone())
}

/// Hair objects ordered so that hair instanced by other hair goes first.
fn export_order<S>(ctx: &ExportContext, scene: &S) -> Vec<ObjectId>
where
    S: MasterShapeProvider + AttributeProvider + ?Sized,
{
    let objects = scene.hair_objects();
    let time = ctx.config.master_time();
    let max_depth = ctx.config.max_nesting_depth;

    let deps = |id: ObjectId| -> Vec<ObjectId> {
        scene
            .instancing(id)
            .map(|settings| {
                settings
                    .masters
                    .iter()
                    .filter_map(|&m| walk_hierarchy(scene, m, time, max_depth).ok())
                    .flatten()
                    .map(|visit| visit.id)
                    .collect()
            })
            .unwrap_or_default()
    };

    match dependency_order(&objects, deps, max_depth) {
        Ok(order) => order,
        Err(e) => {
            log::warn!("Cannot order hair objects ({}), keeping scene order", e);
            objects
        }
    }
}

fn object_name<S>(scene: &S, id: ObjectId) -> String
where
    S: MasterShapeProvider + ?Sized,
{
    scene
        .name(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// Export one object, returning the number of nodes it produced.
fn export_object<S, N>(
    ctx: &mut ExportContext,
    scene: &S,
    sink: &mut N,
    id: ObjectId,
) -> ExportResult<usize>
where
    S: MasterShapeProvider + AttributeProvider + ?Sized,
    N: NodeSink,
{
    if scene.kind(id).is_none() {
        return Err(ExportError::UnknownObject(id));
    }
    let name = object_name(scene, id);
    let matrices: Vec<Mat4> = ctx
        .config
        .transform_times()
        .into_iter()
        .map(|t| scene.global_transform(id, t))
        .collect();
    let sampler = MotionBlurSampler::from_config(&ctx.config);

    let mut attributes = scene.user_attributes(id);

    match scene.instancing(id) {
        None => {
            let samples = sampler.sample(scene, id, &name, &HairBuildOptions::default())?;
            if samples.downgraded {
                ctx.stats.motion_blur_downgrades += 1;
            }
            conform_uniforms(&mut attributes, samples.strand_count(), &name);

            let mut batch = NodeBatch::new(sink);
            for desc in curve_nodes(ctx, &samples, id, &name, &matrices, &attributes)? {
                batch.create(desc)?;
            }
            ctx.stats.strands += samples.strand_count();
            log::info!(
                "{}: {} strands as curves in {} nodes ({:?} motion blur)",
                name,
                samples.strand_count(),
                batch.len(),
                samples.mode
            );
            Ok(batch.commit(id)?)
        }
        Some(settings) => {
            let instanced = instance_object(ctx, scene, id, &name, &settings)?;
            conform_uniforms(&mut attributes, instanced.samples.strand_count(), &name);

            let mut batch = NodeBatch::new(sink);
            let min_pixel_width = ctx.config.min_pixel_width;
            for desc in instance_nodes(&instanced, &name, &matrices, &attributes, min_pixel_width) {
                batch.create(desc)?;
            }
            ctx.stats.strands += instanced.samples.strand_count();
            log::info!(
                "{}: {} strands on {} masters, {} nodes ({:?} motion blur)",
                name,
                instanced.samples.strand_count(),
                instanced.masters.len(),
                batch.len(),
                instanced.samples.mode
            );
            Ok(batch.commit(id)?)
        }
    }
}

fn conform_uniforms(attributes: &mut [UserAttribute], strands: usize, object: &str) {
    for attr in attributes
        .iter_mut()
        .filter(|a| a.scope == AttributeScope::Uniform)
    {
        attr.values
            .conform(strands, &format!("{} attribute {}", object, attr.name));
    }
}

/// Uniform attributes restricted to `strands`, constants as they are.
fn attributes_for(attributes: &[UserAttribute], strands: std::ops::Range<usize>) -> Vec<UserAttribute> {
    attributes
        .iter()
        .map(|attr| match attr.scope {
            AttributeScope::Constant => attr.clone(),
            AttributeScope::Uniform => UserAttribute::new(
                attr.name.clone(),
                AttributeScope::Uniform,
                AttributeArray::from_values(
                    attr.values.kind(),
                    attr.values.values()[strands.clone()].iter().cloned(),
                ),
            ),
        })
        .collect()
}

/// The strands as catmull-rom curves, split into nodes of at most
/// `chunk_size` curves.
fn curve_nodes(
    ctx: &ExportContext,
    samples: &MotionSamples,
    id: ObjectId,
    name: &str,
    matrices: &[Mat4],
    attributes: &[UserAttribute],
) -> Result<Vec<NodeDesc>, StrandError> {
    let strands = samples.reference.strands();
    let keys = samples.key_count();
    let chunk_size = ctx.config.chunk_size.max(1);

    let mut nodes = Vec::new();
    for (chunk, start) in (0..strands.len()).step_by(chunk_size).enumerate() {
        let range = start..(start + chunk_size).min(strands.len());

        let num_points: Vec<u32> = strands[range.clone()]
            .iter()
            .map(|s| s.point_count() as u32 + 2)
            .collect();
        let total = num_points.iter().map(|&n| n as usize).sum();

        let mut points = KeyedBuffer::<Vec3>::new(total, keys);
        for (key, slice) in points.key_slices_mut().enumerate() {
            let mut offset = 0;
            for index in range.clone() {
                let strand = samples.strand_at_key(index, key)?;
                let curve = catmull_rom_points(strand.points());
                let end = offset + curve.len();
                let len = slice.len();
                slice
                    .get_mut(offset..end)
                    .ok_or(StrandError::IndexOutOfRange {
                        what: "curve point",
                        index: end,
                        len,
                    })?
                    .copy_from_slice(&curve);
                offset = end;
            }
        }

        let radius: Vec<f32> = strands[range.clone()]
            .iter()
            .flat_map(|s| s.radii().iter().copied())
            .collect();

        let mut user_data = attributes_for(attributes, range.clone());
        user_data.push(UserAttribute::new(
            "curve_id",
            AttributeScope::Uniform,
            AttributeArray::from_values(
                AttributeKind::Int,
                range.clone().map(|i| AttributeValue::Int(i as i32)),
            ),
        ));

        nodes.push(NodeDesc {
            name: format!("{}.{}", name, chunk),
            id,
            geometry: NodeGeometry::Curves(CurveGeometry {
                basis: CurveBasis::CatmullRom,
                num_points,
                points: points.to_flat(),
                radius,
                min_pixel_width: ctx.config.min_pixel_width,
            }),
            matrices: matrices.to_vec(),
            user_data,
        });
    }
    Ok(nodes)
}

/// Bent geometry of one instanced hair object.
struct InstancedHair {
    samples: MotionSamples,
    masters: Vec<Arc<MasterInstances>>,
    /// Master index per strand
    assignments: Vec<usize>,
    /// Per strand, one bent shape per instance of its master
    bent: Vec<Vec<BentShape>>,
}

fn instance_object<S>(
    ctx: &mut ExportContext,
    scene: &S,
    id: ObjectId,
    name: &str,
    settings: &InstancingSettings,
) -> ExportResult<InstancedHair>
where
    S: MasterShapeProvider + AttributeProvider + ?Sized,
{
    let mut sample = scene
        .strand_sample(id, ctx.config.frame)
        .ok_or(ExportError::MissingSample {
            object: id,
            time: ctx.config.frame,
        })?;
    sample.conform(name);
    let resolved = settings.resolve(&sample, name);

    let sampler = MotionBlurSampler::from_config(&ctx.config);
    let samples = sampler.sample(scene, id, name, &HairBuildOptions::from(&resolved))?;
    if samples.downgraded {
        ctx.stats.motion_blur_downgrades += 1;
    }

    let time = ctx.config.master_time();
    let max_depth = ctx.config.max_nesting_depth;
    let mut masters = Vec::with_capacity(settings.masters.len());
    for &member in &settings.masters {
        let found = ctx.cache.lookup_or_insert(
            CacheKey::new(member, time),
            || is_cacheable_master(scene, member, time, max_depth),
            || resolve_master(scene, member, time, max_depth),
        );
        match found {
            Ok(master) if master.is_empty() => {
                log::warn!("{}: master {} has nothing to instance", name, member)
            }
            Ok(master) => masters.push(master),
            Err(e) => log::warn!("{}: skipping master {}: {}", name, member, e),
        }
    }
    if masters.is_empty() {
        return Err(ExportError::NoValidMasters(id));
    }

    let mut rng = jitter_rng(&ctx.config.jitter);
    let assignments: Vec<usize> = samples
        .reference
        .strands()
        .iter()
        .enumerate()
        .map(|(i, strand)| {
            resolved.assignment.select(
                i,
                strand.weight_map_value(),
                sample.master_indices.get(i).copied(),
                masters.len(),
                rng.as_mut(),
            )
        })
        .collect();

    let keys = samples.key_count();
    let mut bent: Vec<Vec<BentShape>> = vec![Vec::new(); samples.strand_count()];

    // Key-major: the first key allocates each strand's buffers, later keys fill them
    for key in 0..keys {
        let bend = |(index, shapes): (usize, &mut Vec<BentShape>)| -> Result<(), StrandError> {
            let master = &masters[assignments[index]];
            if key == 0 {
                *shapes = master
                    .instances
                    .iter()
                    .map(|instance| BentShape::for_instance(instance, keys))
                    .collect();
            }
            let strand = samples.strand_at_key(index, key)?;
            for (instance, out) in master.instances.iter().zip(shapes.iter_mut()) {
                instance.bend_key(&strand, key, out)?;
            }
            Ok(())
        };

        if ctx.config.parallel {
            bent.par_iter_mut().enumerate().try_for_each(bend)?;
        } else {
            bent.iter_mut().enumerate().try_for_each(bend)?;
        }
    }

    Ok(InstancedHair {
        samples,
        masters,
        assignments,
        bent,
    })
}

fn instance_nodes(
    hair: &InstancedHair,
    name: &str,
    matrices: &[Mat4],
    attributes: &[UserAttribute],
    min_pixel_width: f32,
) -> Vec<NodeDesc> {
    let mut nodes = Vec::new();
    let strands = hair.samples.reference.strands();

    for (index, (shapes, &assigned)) in hair.bent.iter().zip(&hair.assignments).enumerate() {
        let master = &hair.masters[assigned];
        let user_data = per_strand_attributes(attributes, index);

        for (instance, bent) in master.instances.iter().zip(shapes) {
            let shape = instance.shape();
            let points = bent.points.to_flat();
            let geometry = match &shape.kind {
                ShapeKind::Curves { num_points, radius } => NodeGeometry::Curves(CurveGeometry {
                    basis: CurveBasis::CatmullRom,
                    num_points: num_points.clone(),
                    points,
                    radius: radius.clone(),
                    min_pixel_width,
                }),
                ShapeKind::Polymesh => NodeGeometry::Polymesh {
                    points,
                    normals: (bent.normals.count() > 0).then(|| bent.normals.to_flat()),
                    vertex_indices: shape.mesh.vertex_indices.clone(),
                    normal_indices: shape.mesh.normal_indices.clone(),
                },
            };
            nodes.push(NodeDesc {
                name: format!("{}.{} {}", name, index, shape.name),
                id: shape.id,
                geometry,
                matrices: matrices.to_vec(),
                user_data: user_data.clone(),
            });
        }

        let root = strands
            .get(index)
            .and_then(|s| s.point(0))
            .unwrap_or(Vec3::ZERO);
        for duplicate in &master.duplicates {
            let placement = Mat4::from_translation(root) * duplicate.transform;
            nodes.push(NodeDesc {
                name: format!("{}.{} {}", name, index, duplicate.name),
                id: duplicate.id,
                geometry: NodeGeometry::Duplicate {
                    source: duplicate.id,
                },
                matrices: matrices.iter().map(|m| *m * placement).collect(),
                user_data: user_data.clone(),
            });
        }
    }
    nodes
}

/// Attributes of one instance node: constants as they are, uniforms reduced
/// to the strand's own value.
fn per_strand_attributes(attributes: &[UserAttribute], strand: usize) -> Vec<UserAttribute> {
    attributes
        .iter()
        .filter_map(|attr| match attr.scope {
            AttributeScope::Constant => Some(attr.clone()),
            AttributeScope::Uniform => attr.values.get(strand).map(|value| {
                UserAttribute::new(
                    attr.name.clone(),
                    AttributeScope::Constant,
                    AttributeArray::from_values(attr.values.kind(), [value.clone()]),
                )
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::assign::AssignmentMode;
    use crate::config::ExportConfig;
    use crate::context::AbortSignal;
    use crate::mesh::Mesh;
    use crate::output::RecordingSink;
    use crate::provider::{ObjectKind, StrandSample};
    use crate::scene::{Scene, SceneObject, Transform};

    fn fur_sample(counts: &[u32]) -> StrandSample {
        let mut positions = Vec::new();
        for (s, &count) in counts.iter().enumerate() {
            for i in 0..count {
                positions.push(Vec3::new(s as f32 * 2.0, i as f32, 0.0));
            }
        }
        let total = positions.len();
        StrandSample {
            vertex_counts: counts.to_vec(),
            positions,
            radii: vec![0.1; total],
            velocities: vec![Vec3::X * 24.0; total],
            ..Default::default()
        }
    }

    fn leaf() -> SceneObject {
        SceneObject::new(10, "leaf", ObjectKind::Polymesh).with_mesh(Mesh::new(
            vec![Vec3::ZERO, Vec3::new(0.5, 0.5, 0.0), Vec3::Y],
            vec![0, 1, 2],
            Some((vec![Vec3::Z], vec![0, 0, 0])),
        ))
    }

    fn instanced_scene() -> Scene {
        let mut scene = Scene::new("test");
        scene.add_object(leaf());
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair)
                .with_hair(1.0, fur_sample(&[3, 2, 4]))
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(10)],
                    ..Default::default()
                }),
        );
        scene
    }

    fn serial() -> ExportConfig {
        ExportConfig {
            parallel: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_curves_export() {
        let mut scene = Scene::new("curves");
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair).with_hair(1.0, fur_sample(&[3, 2])),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.objects_exported, 1);
        assert_eq!(stats.strands, 2);
        assert_eq!(stats.nodes, 1);

        let node = sink.node("fur.0").unwrap();
        let NodeGeometry::Curves(curves) = &node.geometry else {
            panic!("expected curves, got {:?}", node.geometry);
        };
        assert_eq!(curves.num_points, vec![5, 4]);
        assert_eq!(curves.points.count, 9);
        assert_eq!(curves.points.keys, 1);
        assert_eq!(curves.radius.len(), 5);
        assert_eq!(curves.min_pixel_width, 0.25);
        // End points repeated
        assert_eq!(&curves.points.data[0..3], &curves.points.data[3..6]);

        let ids = node.user_data.iter().find(|a| a.name == "curve_id").unwrap();
        assert_eq!(ids.declaration(), "uniform INT");
        assert_eq!(ids.values.len(), 2);
        assert_eq!(sink.groups().len(), 1);
    }

    #[test]
    fn test_curves_chunking() {
        let mut scene = Scene::new("chunks");
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair).with_hair(1.0, fur_sample(&[2, 2, 2])),
        );

        let mut ctx = ExportContext::new(ExportConfig {
            chunk_size: 2,
            ..serial()
        });
        let mut sink = RecordingSink::new();
        export_frame(&mut ctx, &scene, &mut sink).unwrap();

        assert_eq!(sink.live_count(), 2);
        let second = sink.node("fur.1").unwrap();
        let ids = second.user_data.iter().find(|a| a.name == "curve_id").unwrap();
        assert_eq!(ids.values.get(0), Some(&AttributeValue::Int(2)));
    }

    #[test]
    fn test_empty_strand_fails_object() {
        let mut scene = Scene::new("broken");
        let mut sample = fur_sample(&[2]);
        sample.vertex_counts.push(0);
        scene.add_object(SceneObject::new(1, "fur", ObjectKind::Hair).with_hair(1.0, sample));
        scene.add_object(
            SceneObject::new(2, "ok", ObjectKind::Hair).with_hair(1.0, fur_sample(&[2])),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.objects_failed, 1);
        assert_eq!(stats.objects_exported, 1);
        assert!(sink.node("fur.0").is_none());
        assert!(sink.node("ok.0").is_some());
    }

    #[test]
    fn test_instanced_export() {
        let scene = instanced_scene();
        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();

        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.cache_computations, 1);
        let node = sink.node("fur.2 leaf").unwrap();
        assert_eq!(node.id, ObjectId(10));
        let NodeGeometry::Polymesh {
            points,
            normals,
            vertex_indices,
            ..
        } = &node.geometry
        else {
            panic!("expected a polymesh");
        };
        assert_eq!(points.count, 3);
        assert_eq!(normals.as_ref().map(|n| n.count), Some(1));
        assert_eq!(vertex_indices, &vec![0, 1, 2]);

        // The leaf tip lands on the tip of strand 2, x = 4, height 3
        let tip = &points.data[6..9];
        assert!((tip[0] - 4.0).abs() < 1e-4, "got {:?}", tip);
        assert!((tip[1] - 3.0).abs() < 1e-4, "got {:?}", tip);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let scene = instanced_scene();
        let run = |parallel: bool| {
            let mut ctx = ExportContext::new(ExportConfig {
                parallel,
                ..Default::default()
            });
            let mut sink = RecordingSink::new();
            export_frame(&mut ctx, &scene, &mut sink).unwrap();
            sink.nodes().cloned().collect::<Vec<_>>()
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn test_masters_are_cached_across_objects() {
        let mut scene = instanced_scene();
        scene.add_object(
            SceneObject::new(2, "fur2", ObjectKind::Hair)
                .with_hair(1.0, fur_sample(&[2]))
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(10)],
                    ..Default::default()
                }),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.cache_computations, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.nodes, 4);
    }

    #[test]
    fn test_abort_creates_nothing() {
        let scene = instanced_scene();
        let abort = AbortSignal::new();
        abort.abort();
        let mut ctx = ExportContext::with_abort(serial(), abort);
        let mut sink = RecordingSink::new();
        assert!(matches!(
            export_frame(&mut ctx, &scene, &mut sink),
            Err(ExportError::Aborted)
        ));
        assert_eq!(sink.live_count(), 0);
    }

    #[test]
    fn test_sink_failure_rolls_back_object() {
        let scene = instanced_scene();
        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        sink.fail_after = Some(2);
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.objects_failed, 1);
        assert_eq!(sink.live_count(), 0);
        assert_eq!(sink.destroyed(), 2);
    }

    #[test]
    fn test_no_valid_masters() {
        let mut scene = Scene::new("nomaster");
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair)
                .with_hair(1.0, fur_sample(&[2]))
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(99)],
                    ..Default::default()
                }),
        );
        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.objects_failed, 1);
    }

    #[test]
    fn test_light_member_is_duplicated() {
        let mut scene = Scene::new("lights");
        scene.add_object(SceneObject::new(20, "bulb", ObjectKind::Model));
        scene.add_object(leaf().with_parent(20));
        scene.add_object(
            SceneObject::new(21, "glow", ObjectKind::Light)
                .with_parent(20)
                .with_transform(Transform::from_translation(Vec3::Y)),
        );
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair)
                .with_hair(1.0, fur_sample(&[2, 2]))
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(20)],
                    ..Default::default()
                }),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        let stats = export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert_eq!(stats.nodes, 4);
        assert!(ctx.cache.is_uncacheable(ObjectId(20)));

        let glow = sink.node("fur.1 glow").unwrap();
        assert_eq!(
            glow.geometry,
            NodeGeometry::Duplicate {
                source: ObjectId(21)
            }
        );
        // Strand 1 is rooted at x = 2, the light sits 1 above the model origin
        let at = glow.matrices[0].transform_point3(Vec3::ZERO);
        assert!((at - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5, "got {:?}", at);
    }

    #[test]
    fn test_weight_map_assignment() {
        let mut scene = Scene::new("weights");
        scene.add_object(leaf());
        scene.add_object(
            SceneObject::new(11, "stem", ObjectKind::Polymesh)
                .with_mesh(Mesh::new(vec![Vec3::ZERO, Vec3::Y], Vec::new(), None)),
        );
        let mut sample = fur_sample(&[2, 2, 2]);
        sample.weight_maps.insert("density".into(), vec![0.0, 0.9, 0.2]);
        scene.add_object(
            SceneObject::new(1, "fur", ObjectKind::Hair)
                .with_hair(1.0, sample)
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(10), ObjectId(11)],
                    assignment: AssignmentMode::WeightMap {
                        map: "density".into(),
                        fuzziness: 0.0,
                    },
                    ..Default::default()
                }),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        export_frame(&mut ctx, &scene, &mut sink).unwrap();
        assert!(sink.node("fur.0 leaf").is_some());
        assert!(sink.node("fur.1 stem").is_some());
        assert!(sink.node("fur.2 leaf").is_some());
    }

    #[test]
    fn test_velocity_blur_keys() {
        let scene = instanced_scene();
        let mut config = serial();
        config.motion_blur.enabled = true;
        config.motion_blur.exact = false;
        let mut ctx = ExportContext::new(config);
        let mut sink = RecordingSink::new();
        export_frame(&mut ctx, &scene, &mut sink).unwrap();

        let node = sink.node("fur.0 leaf").unwrap();
        assert_eq!(node.matrices.len(), 2);
        let NodeGeometry::Polymesh { points, .. } = &node.geometry else {
            panic!("expected a polymesh");
        };
        assert_eq!(points.keys, 2);
        // Root moves by velocity * seconds per frame * offset
        assert!((points.data[0] + 0.25).abs() < 1e-4, "got {}", points.data[0]);
        assert!((points.data[9] - 0.25).abs() < 1e-4, "got {}", points.data[9]);
    }

    #[test]
    fn test_hair_masters_export_first() {
        let mut scene = Scene::new("order");
        scene.add_object(
            SceneObject::new(1, "outer", ObjectKind::Hair)
                .with_hair(1.0, fur_sample(&[2]))
                .with_instancing(InstancingSettings {
                    masters: vec![ObjectId(2)],
                    ..Default::default()
                }),
        );
        scene.add_object(
            SceneObject::new(2, "inner", ObjectKind::Hair).with_hair(1.0, fur_sample(&[2])),
        );

        let mut ctx = ExportContext::new(serial());
        let mut sink = RecordingSink::new();
        export_frame(&mut ctx, &scene, &mut sink).unwrap();

        let groups = sink.groups();
        assert_eq!(groups[0].object, ObjectId(2));
        assert_eq!(groups[1].object, ObjectId(1));
        let NodeGeometry::Curves(curves) = &groups[1].nodes[0].geometry else {
            panic!("expected bent curves");
        };
        // Two master points plus the duplicated ends
        assert_eq!(curves.num_points, vec![4]);
        assert_eq!(curves.points.count, 4);
        assert_eq!(curves.radius.len(), 2);

        let p = &curves.points.data;
        assert_eq!(p[0..3], p[3..6], "root must be duplicated");
        assert_eq!(p[6..9], p[9..12], "tip must be duplicated");
        assert_ne!(p[3..6], p[6..9]);
    }
}
