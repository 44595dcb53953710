use burn_ndarray::NdArray;
use coordmap_core::spatial::Affine4;
use coordmap_core::transform::{
    apply_affine, AffineTransform, CoregParameters, DctWarp, LegacyNormalization,
};
use coordmap_core::PointSet;

type B = NdArray<f64>;

/// Coefficients `Tr[2, 2, 2, 3]`, row-major with the channel fastest.
const COEFFICIENTS: [f64; 24] = [
    0.25, -0.15, 0.45, 0.5, -0.4, 0.7, 0.75, -0.65, 0.95, 1.0, -0.9, 1.2,
    1.25, -1.15, 1.45, 1.5, -1.4, 1.7, 1.75, -1.65, 1.95, 2.0, -1.9, 2.2,
];

#[test]
fn test_dct_warp_matches_reference_values() {
    let device = Default::default();
    let warp = DctWarp::<B>::from_values(COEFFICIENTS.to_vec(), [2, 2, 2, 3], [5, 4, 3], &device)
        .unwrap()
        .expect("non-empty coefficients");
    assert_eq!(warp.basis_counts(), [2, 2, 2]);

    let legacy = LegacyNormalization::new(Some(warp), Affine4::identity(), Affine4::identity());
    let voxels = PointSet::from_points(&[[2.0, 3.0, 1.5], [1.0, 1.0, 1.0], [4.25, 2.0, 3.0]]);
    let mapped = legacy.map_points(&voxels).unwrap();

    // Direct triple sum over the orthonormal DCT-II basis, computed offline.
    let expected = [
        [2.040308598452319, 2.978207979161955, 1.577341753680866],
        [2.933202956482069, -0.777852619550940, 3.243903630344327],
        [4.294716938901346, 1.955283061098654, 3.044716938901346],
    ];
    for (j, want) in expected.iter().enumerate() {
        let got = mapped.world.point(j);
        for i in 0..3 {
            assert!(
                (got[i] - want[i]).abs() < 1e-12,
                "point {} axis {}: got {}, expected {}",
                j, i, got[i], want[i]
            );
        }
        assert_eq!(mapped.voxel.point(j), got);
    }
}

#[test]
fn test_legacy_affines_apply_after_warp() {
    let device = Default::default();
    let warp = DctWarp::<B>::from_values(COEFFICIENTS.to_vec(), [2, 2, 2, 3], [5, 4, 3], &device)
        .unwrap();
    let warp_affine = Affine4::from_scale_translation([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
    let dest_affine = Affine4::from_scale_translation([-2.0, 2.0, 2.0], [90.0, -126.0, -72.0]);
    let legacy = LegacyNormalization::new(warp, warp_affine, dest_affine);

    let voxels = PointSet::from_points(&[[1.0, 1.0, 1.0]]);
    let mapped = legacy.map_points(&voxels).unwrap();

    let displaced = [2.933202956482069, -0.777852619550940, 3.243903630344327];
    let want_voxel = [displaced[0] + 0.5, displaced[1] + 0.5, displaced[2] + 0.5];
    let want_world = [
        -2.0 * want_voxel[0] + 90.0,
        2.0 * want_voxel[1] - 126.0,
        2.0 * want_voxel[2] - 72.0,
    ];
    for i in 0..3 {
        assert!((mapped.voxel.point(0)[i] - want_voxel[i]).abs() < 1e-12);
        assert!((mapped.world.point(0)[i] - want_world[i]).abs() < 1e-12);
    }
}

#[test]
fn test_legacy_without_warp_is_pure_affine() {
    let warp_affine = Affine4::from_rows([
        [0.9, 0.1, 0.0, 3.0],
        [0.0, 1.1, 0.0, -2.0],
        [0.0, 0.05, 1.0, 1.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    let dest_affine = Affine4::from_scale_translation([-1.0, 1.0, 1.0], [78.0, -112.0, -70.0]);
    let legacy = LegacyNormalization::<B>::new(None, warp_affine, dest_affine);
    assert!(!legacy.has_warp());

    let voxels = PointSet::from_points(&[[12.0, 40.5, 33.0], [1.0, 1.0, 1.0]]);
    let mapped = legacy.map_points(&voxels).unwrap();
    let expected = apply_affine(&(dest_affine * warp_affine), &voxels).unwrap();
    for j in 0..2 {
        for i in 0..3 {
            assert!((mapped.world.point(j)[i] - expected.point(j)[i]).abs() < 1e-12);
        }
    }
}

#[test]
fn test_coreg_vector_inverts_rigid_motion() {
    // A pure translation estimated as +5 mm in x maps moving points back by -5 mm.
    let params = CoregParameters::from_slice(&[5.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
    let source = Affine4::from_scale_translation([1.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
    let transform = AffineTransform::from_coreg(&params).unwrap().compose(&source);

    let out = transform
        .map_points(&PointSet::from_points(&[[10.0, 20.0, 30.0]]))
        .unwrap();
    assert_eq!(out.point(0), [5.0, 20.0, 30.0]);
}
