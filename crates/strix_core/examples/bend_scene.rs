//! Example: Bend a leaf along a handful of curved strands and inspect the result.
//!
//! Run with: cargo run --example bend_scene -- [strand-count]

use std::env;
use std::f32::consts::TAU;

use strix_core::{
    export_frame, AssignmentMode, ExportConfig, ExportContext, InstancingSettings, Mesh,
    NodeGeometry, ObjectId, ObjectKind, RecordingSink, Scene, SceneObject, StrandSample,
};
use strix_math::Vec3;

fn main() {
    env_logger::init();

    let count: usize = env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(8);

    // A quad leaf, one unit tall
    let leaf = Mesh::new(
        vec![
            Vec3::new(-0.2, 0.0, 0.0),
            Vec3::new(0.2, 0.0, 0.0),
            Vec3::new(0.2, 1.0, 0.0),
            Vec3::new(-0.2, 1.0, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
        Some((vec![Vec3::Z], vec![0; 6])),
    );

    // Strands arranged in a ring, each curving outwards
    let mut sample = StrandSample::default();
    for s in 0..count {
        let angle = s as f32 / count as f32 * TAU;
        let out = Vec3::new(angle.cos(), 0.0, angle.sin());
        for i in 0..6 {
            let t = i as f32 / 5.0;
            sample.positions.push(out * (1.0 + t * t) + Vec3::Y * t * 2.0);
            sample.radii.push(1.0 - 0.5 * t);
        }
        sample.vertex_counts.push(6);
    }

    let mut scene = Scene::new("bend_scene");
    scene.add_object(SceneObject::new(1, "leaf", ObjectKind::Polymesh).with_mesh(leaf));
    scene.add_object(
        SceneObject::new(2, "fur", ObjectKind::Hair)
            .with_hair(1.0, sample)
            .with_instancing(InstancingSettings {
                masters: vec![ObjectId(1)],
                assignment: AssignmentMode::Random,
                ..Default::default()
            }),
    );

    let mut ctx = ExportContext::new(ExportConfig::default());
    let mut sink = RecordingSink::new();
    match export_frame(&mut ctx, &scene, &mut sink) {
        Ok(stats) => {
            println!("\n=== Scene: {} ===", scene.name);
            println!("Strands: {}", stats.strands);
            println!("Nodes: {}", stats.nodes);
            println!(
                "Masters computed: {}, reused: {}",
                stats.cache_computations, stats.cache_hits
            );

            println!("\n--- Nodes ---");
            for node in sink.nodes() {
                if let NodeGeometry::Polymesh { points, .. } = &node.geometry {
                    let tip = &points.data[6..9];
                    println!(
                        "  {} - {} points, tip at ({:.2}, {:.2}, {:.2})",
                        node.name, points.count, tip[0], tip[1], tip[2]
                    );
                }
            }
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
        }
    }
}
