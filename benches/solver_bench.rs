use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use penalty_dynamics::*;
use std::hint::black_box;

const DT: f64 = 0.001;

/// A ground plane and `count` boxes, each probed at its four bottom corners.
fn prepare_session(count: usize, parallel: bool) -> Session {
    let mut session = Session::new(SimulatorConfig::default(), DT).unwrap();
    session.set_collision_detector(Box::new(GroundPlaneDetector::new("ground")));
    session.set_parallel_enabled(parallel);

    let mut ground = Multibody::new("ground", RootJoint::Fixed);
    ground.add_link(Link::new("ground", None, JointType::Fixed));
    let mut specs = vec![BodySpec::new(ground)];

    let half = 0.05;
    for i in 0..count {
        let mut link = Link::new("box", None, JointType::Fixed)
            .with_mass_properties(MassProperties::solid_box(DVec3::splat(half), 0.5));
        for (x, y) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            link = link.with_contact_point(DVec3::new(x * half, y * half, -half));
        }
        let mut body = Multibody::new(&format!("box{i}"), RootJoint::Free).with_root_transform(
            Transform::from_translation(DVec3::new(i as f64 * 0.2, 0.0, half - 1e-4)),
        );
        body.add_link(link);
        specs.push(BodySpec::new(body));
    }
    session.initialize(specs).unwrap();
    session
}

fn bench_resting_contacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("resting_contacts");
    for &count in &[8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            let mut session = prepare_session(count, false);
            b.iter(|| black_box(session.step(&[]).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            let mut session = prepare_session(count, true);
            b.iter(|| black_box(session.step(&[]).unwrap()))
        });
    }
    group.finish();
}

fn chain(links: usize) -> Multibody {
    let mut body = Multibody::new("chain", RootJoint::Free);
    body.add_link(Link::new("base", None, JointType::Fixed));
    for i in 1..links {
        let axis = if i % 2 == 0 { DVec3::X } else { DVec3::Y };
        body.add_link(
            Link::new(&format!("link{i}"), Some(i - 1), JointType::Revolute { axis })
                .with_offset(Transform::from_translation(DVec3::new(0.0, 0.0, 0.1))),
        );
    }
    body
}

fn bench_mass_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass_matrix");
    for &links in &[4usize, 16, 32] {
        let mut body = chain(links);
        body.update_kinematics();
        group.bench_with_input(BenchmarkId::from_parameter(links), &body, |b, body| {
            b.iter(|| black_box(dynamics::forward::mass_matrix(body)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resting_contacts, bench_mass_matrix);
criterion_main!(benches);
