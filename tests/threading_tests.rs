use approx::assert_relative_eq;
use penalty_dynamics::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_session_is_send_and_shared_session_is_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync_send<T: Sync + Send>() {}
    assert_send::<Session>();
    assert_sync_send::<SharedSession>();
}

#[test]
fn test_shared_session_across_threads() {
    let dt = 0.001;
    let mut body = Multibody::new("ball", RootJoint::Free)
        .with_root_transform(Transform::from_translation(DVec3::new(0.0, 0.0, 1.0)));
    body.add_link(Link::new("ball", None, JointType::Fixed));

    let mut session = Session::new(SimulatorConfig::default(), dt).unwrap();
    session.initialize(vec![BodySpec::new(body)]).unwrap();
    let session = session.into_shared();

    let mut handles = vec![];
    for _ in 0..4 {
        let session_clone = Arc::clone(&session);
        let handle = thread::spawn(move || {
            let mut session = session_clone.lock();
            session.step(&[]).unwrap();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let session = session.lock();
    assert_relative_eq!(session.world().current_time(), 4.0 * dt, epsilon = 1e-15);
}
