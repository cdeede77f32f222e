use computed_variable::{
    context::Context, error::Error, matrix::Matrix, value::Value, variable::Variable,
};

fn leaf(name: &str, value: Value) -> Variable {
    let v = Variable::new(name);
    v.set_independent(value).unwrap();
    v
}

#[test]
fn derivative_with_respect_to_itself() {
    let ctx = Context::default();
    let a = leaf("a", Value::RealVector(vec![1., 2.]));
    let b = leaf("b", Value::Real(3.));
    let dot = Variable::new("dot");
    dot.set_dot_product(&a, &a).unwrap();
    let c = Variable::new("c");
    c.set_composite(vec![a.clone(), b.clone(), dot.clone()]).unwrap();

    for v in [&a, &b, &dot, &c] {
        let n = v.number_of_values().unwrap();

        let d = v.evaluate_derivative(&[v.clone()], &ctx).unwrap();
        assert_eq!(d.matrices(), &[Matrix::identity(n)]);

        let d = v.evaluate_derivative(&[v.clone(), v.clone()], &ctx).unwrap();
        assert!(d.matrices()[2].is_zero());
        assert_eq!((d.matrices()[2].nrows(), d.matrices()[2].ncols()), (n, n * n));
    }
}

#[test]
fn composite_of_two_and_three() {
    let ctx = Context::default();
    let a = leaf("a", Value::RealVector(vec![1., 2.]));
    let b = leaf("b", Value::RealVector(vec![3., 4., 5.]));
    let c = Variable::new("c");
    c.set_composite(vec![a.clone(), b.clone()]).unwrap();

    assert_eq!(
        c.evaluate(&ctx).unwrap(),
        Value::RealVector(vec![1., 2., 3., 4., 5.])
    );

    let d = c.evaluate_derivative(&[a.clone()], &ctx).unwrap();
    let mut expected = Matrix::new(5, 2);
    expected[(0, 0)] = 1.;
    expected[(1, 1)] = 1.;
    assert_eq!(d.matrices(), &[expected]);
}

#[test]
fn dot_product() {
    let ctx = Context::default();
    let u = leaf("u", Value::RealVector(vec![1., 2.]));
    let v = leaf("v", Value::RealVector(vec![3., 4.]));
    let d = Variable::new("d");
    d.set_dot_product(&u, &v).unwrap();

    assert_eq!(d.evaluate(&ctx).unwrap(), Value::Real(11.));
    let du = d.evaluate_derivative(&[u.clone()], &ctx).unwrap();
    assert_eq!(du.matrices()[0].data(), &[3., 4.]);

    let duv = d.evaluate_derivative(&[u.clone(), v.clone()], &ctx).unwrap();
    let mixed = duv.matrix(&[u.clone(), v.clone()]).unwrap();
    assert_eq!(mixed.data(), Matrix::identity(2).data());

    // an unrelated scalar
    let s = leaf("s", Value::Real(1.));
    let ds = d.evaluate_derivative(&[s.clone(), u.clone()], &ctx).unwrap();
    assert!(ds.matrices()[0].is_zero());
    assert_eq!(ds.matrices()[1].data(), &[3., 4.]);
    assert!(ds.matrices()[2].is_zero());
}

#[test]
fn evaluation_is_idempotent() {
    let ctx = Context::default();
    let c = leaf("c", Value::RealVector(vec![0.3, 1.2, 2.5]));
    let f = leaf("f", Value::Real(1.7));
    let p = Variable::new("p");
    p.set_prolate_spheroidal_to_rectangular_cartesian(&c, &f)
        .unwrap();

    let y = leaf("y", Value::Real(0.));
    let q = Variable::new("q");
    q.set_polynomial(&y, vec![0.5, -1., 0.25]).unwrap();
    let h = Variable::new("h");
    h.set_composition(&q, vec![(y.clone(), f.clone())]).unwrap();
    let px = Variable::new("px");
    px.set_composite(vec![p.clone(), c.clone()]).unwrap();

    for v in [&p, &h, &px] {
        let a = v.evaluate(&ctx).unwrap().get_reals();
        let b = v.evaluate(&ctx).unwrap().get_reals();
        assert_eq!(
            a.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );

        let da = v.evaluate_derivative(&[c.clone(), f.clone()], &ctx).unwrap();
        let db = v.evaluate_derivative(&[c.clone(), f.clone()], &ctx).unwrap();
        assert_eq!(da, db);
    }
}

#[test]
fn setters_and_getters_round_trip() {
    let a = leaf("a", Value::RealVector(vec![1., 2., 3.]));
    let b = leaf("b", Value::Real(4.));
    assert_eq!(a.get_independent(), Some(Value::RealVector(vec![1., 2., 3.])));

    let i = Variable::new("i");
    i.set_identity(&a).unwrap();
    assert!(i.get_identity().unwrap().ptr_eq(&a));

    let c = Variable::new("c");
    c.set_composite(vec![b.clone(), a.clone(), b.clone()]).unwrap();
    let parts = c.get_composite().unwrap();
    assert!(parts[0].ptr_eq(&b) && parts[1].ptr_eq(&a) && parts[2].ptr_eq(&b));

    let p = Variable::new("p");
    p.set_prolate_spheroidal_to_rectangular_cartesian(&a, &b)
        .unwrap();
    let (pc, pf) = p.get_prolate_spheroidal_to_rectangular_cartesian().unwrap();
    assert!(pc.ptr_eq(&a) && pf.ptr_eq(&b));

    let d = Variable::new("d");
    d.set_dot_product(&a, &a).unwrap();
    let (du, dv) = d.get_dot_product().unwrap();
    assert!(du.ptr_eq(&a) && dv.ptr_eq(&a));

    let q = Variable::new("q");
    q.set_polynomial(&b, vec![1., 0., -2.5]).unwrap();
    let (qi, qc) = q.get_polynomial().unwrap();
    assert!(qi.ptr_eq(&b));
    assert_eq!(qc, vec![1., 0., -2.5]);

    let comp = Variable::new("comp");
    comp.set_composition(&q, vec![(b.clone(), d.clone())]).unwrap();
    let (cd, pairs) = comp.get_composition().unwrap();
    assert!(cd.ptr_eq(&q));
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].0.ptr_eq(&b) && pairs[0].1.ptr_eq(&d));

    let der = Variable::new("der");
    der.set_derivative(&p, vec![a.clone(), b.clone()]).unwrap();
    let (dd, di) = der.get_derivative().unwrap();
    assert!(dd.ptr_eq(&p));
    assert!(di[0].ptr_eq(&a) && di[1].ptr_eq(&b));

    // getters of other kinds return nothing
    assert!(a.get_identity().is_none());
    assert!(c.get_independent().is_none());
    assert!(der.get_composition().is_none());
}

#[test]
fn types_are_reported() {
    let a = leaf("a", Value::RealVector(vec![1., 2., 3.]));
    let b = leaf("b", Value::Real(4.));
    let p = Variable::new("p");
    p.set_prolate_spheroidal_to_rectangular_cartesian(&a, &b)
        .unwrap();
    let der = Variable::new("der");
    der.set_derivative(&p, vec![a.clone()]).unwrap();

    assert_eq!(
        p.type_string(),
        Some("prolate_spheroidal_to_rectangular_cartesian")
    );
    assert_eq!(der.type_string(), Some("derivative"));
    assert_eq!(der.number_of_values().unwrap(), 9);
    assert_eq!(
        der.value_kind().unwrap(),
        computed_variable::value::ValueKind::DerivativeMatrix
    );
    assert!(der.is_defined());

    let untyped = Variable::anonymous();
    let broken = Variable::new("broken");
    broken.set_identity(&untyped).unwrap();
    assert!(!broken.is_defined());
    assert!(matches!(
        broken.evaluate(&Context::default()),
        Err(Error::InvalidArgument(_))
    ));
}
