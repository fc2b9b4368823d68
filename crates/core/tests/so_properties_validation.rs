//! Spherical overdensity validation
//!
//! End-to-end checks of the profile, threshold and aperture stages against
//! hand-computable halos, plus property tests on random particle mixtures.
//!
//! Run tests with: cargo test --test `so_properties_validation`

use approx::assert_relative_eq;
use halo_so_core::core_types::cosmo::ReferenceDensities;
use halo_so_core::core_types::particles::fields;
use halo_so_core::properties::result::ResultValue;
use halo_so_core::{
    HaloContext, ParticleData, PartType, Quantities, Quantity, SnapshotUnits, SoProperties,
    SpeciesData, Unit, Vec3, VectorQuantity, Vectors,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const M0: f64 = 1.0e10;

fn centre() -> Vec3 {
    Vec3::new(10.0, 10.0, 10.0)
}

fn halo() -> HaloContext {
    HaloContext {
        index: 42,
        centre: VectorQuantity::new(centre(), Unit::MPC),
        search_radius: Quantity::new(5.0, Unit::MPC),
        read_radius: Quantity::new(6.0, Unit::MPC),
    }
}

/// Reference densities with the critical value set to `critical` Msun/Mpc^3
fn densities(critical: f64) -> ReferenceDensities {
    ReferenceDensities {
        critical: Quantity::new(critical, Unit::MSUN_PER_MPC3),
        mean: Quantity::new(0.3 * critical, Unit::MSUN_PER_MPC3),
    }
}

fn vectors(values: Vec<Vec3>, unit: Unit) -> Vectors {
    Vectors::new(values, unit)
}

fn dark_matter(offsets: &[Vec3], velocity: Vec3) -> SpeciesData {
    let n = offsets.len();
    SpeciesData::new(PartType::DarkMatter)
        .with_vector(
            fields::COORDINATES,
            vectors(offsets.iter().map(|o| centre() + o).collect(), Unit::MPC),
        )
        .with_vector(fields::VELOCITIES, vectors(vec![velocity; n], Unit::KM_PER_S))
        .with_scalar(fields::MASSES, Quantities::new(vec![M0; n], Unit::MSUN))
}

fn gas(offsets: &[Vec3], masses: &[f64], temperatures: &[f64]) -> SpeciesData {
    let n = offsets.len();
    SpeciesData::new(PartType::Gas)
        .with_vector(
            fields::COORDINATES,
            vectors(offsets.iter().map(|o| centre() + o).collect(), Unit::MPC),
        )
        .with_vector(fields::VELOCITIES, vectors(vec![Vec3::zeros(); n], Unit::KM_PER_S))
        .with_scalar(fields::MASSES, Quantities::new(masses.to_vec(), Unit::MSUN))
        .with_scalar(fields::TEMPERATURES, Quantities::new(temperatures.to_vec(), Unit::KELVIN))
        .with_scalar(fields::XRAY_LUMINOSITIES, Quantities::new(vec![1.0e40; n], Unit::ERG_PER_S))
        .with_scalar(
            fields::XRAY_PHOTON_LUMINOSITIES,
            Quantities::new(vec![1.0e48; n], Unit::PER_SECOND),
        )
        .with_scalar(fields::COMPTON_Y_PARAMETERS, Quantities::new(vec![1.0e-9; n], Unit::MPC2))
}

fn on_x_axis(radii: &[f64]) -> Vec<Vec3> {
    radii.iter().map(|&r| Vec3::new(r, 0.0, 0.0)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// END-TO-END SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

/// Five equal-mass particles at 1..5 Mpc. Enclosed density at the i-th
/// particle is 3 i m0 / (4 pi i^3): 0.0265 m0 at i = 3, 0.0149 m0 at i = 4.
/// A reference of 0.02 m0 is first undershot at the 4th particle.
#[test]
fn test_dark_matter_only_halo() {
    let data = ParticleData::new().with_species(dark_matter(
        &on_x_axis(&[1.0, 2.0, 3.0, 4.0, 5.0]),
        Vec3::new(100.0, 0.0, 0.0),
    ));
    // 200 x 1e6 = 0.02 m0
    let so = SoProperties::new(200.0, "crit", &densities(1.0e6), SnapshotUnits::default()).unwrap();
    let out = so.calculate(&halo(), &data).unwrap();
    let r = &out.result;

    assert_eq!(r.scalar("r_200_crit").unwrap(), Quantity::new(4.0, Unit::MPC));
    assert_relative_eq!(r.scalar("m_200_crit").unwrap().value(), 4.0 * M0);
    assert_eq!(r.scalar("m_200_crit").unwrap().unit(), Unit::MSUN);
    assert!(!out.radius_exhausted);

    // Strictly inside 4 Mpc: particles at 1, 2 and 3 Mpc
    assert_relative_eq!(r.scalar("Mdm_200_crit").unwrap().value(), 3.0 * M0);
    let com = r.vector("com_200_crit").unwrap();
    assert_relative_eq!(com.value().x, 12.0, epsilon = 1e-12);
    assert_relative_eq!(com.value().y, 10.0, epsilon = 1e-12);
    assert_relative_eq!(r.vector("vcom_200_crit").unwrap().value().x, 100.0, epsilon = 1e-9);

    for name in ["Mgas", "Mstar", "MBHdyn", "Mstarinit", "MBHsub", "Mhotgas"] {
        let q = r.scalar(&format!("{name}_200_crit")).unwrap();
        assert!(q.is_zero(), "{name}");
        assert_eq!(q.unit(), Unit::MSUN, "{name}");
    }
    assert_eq!(r.scalar("Tgas_200_crit").unwrap(), Quantity::zero(Unit::KELVIN));
    assert_eq!(
        r.get("m_200_crit").unwrap().description,
        "Mass within a sphere within which the density is 200 times the critical value"
    );
}

#[test]
fn test_empty_halo_matches_populated_units() {
    let so = SoProperties::new(500.0, "crit", &densities(1.0e6), SnapshotUnits::default()).unwrap();
    let empty = so.calculate(&halo(), &ParticleData::new()).unwrap().result;

    let data = ParticleData::new()
        .with_species(dark_matter(&on_x_axis(&[0.1, 0.2, 3.0]), Vec3::zeros()))
        .with_species(gas(&on_x_axis(&[0.15, 0.25]), &[M0, M0], &[1.0e7, 1.0e7]));
    let populated = so.calculate(&halo(), &data).unwrap().result;
    assert!(populated.scalar("r_500_crit").unwrap().value() > 0.0);

    assert_eq!(empty.len(), populated.len());
    for (name, entry) in empty.iter() {
        let other = populated.get(name).unwrap();
        assert_eq!(entry.value.unit(), other.value.unit(), "{name}");
        assert_eq!(entry.description, other.description);
        match entry.value {
            ResultValue::Scalar(q) => assert_eq!(q.value(), 0.0, "{name}"),
            ResultValue::Vector(v) => assert_eq!(*v.value(), Vec3::zeros(), "{name}"),
        }
    }
}

#[test]
fn test_halo_below_threshold_is_zero() {
    let data =
        ParticleData::new().with_species(dark_matter(&on_x_axis(&[1.0, 2.0]), Vec3::zeros()));
    // Enclosed density is at most 0.24 m0, far below 200 m0
    let so =
        SoProperties::new(200.0, "mean", &densities(M0 / 0.3), SnapshotUnits::default()).unwrap();
    let out = so.calculate(&halo(), &data).unwrap();
    assert_eq!(out.result.scalar("r_200_mean").unwrap(), Quantity::zero(Unit::MPC));
    assert_eq!(out.result.scalar("m_200_mean").unwrap(), Quantity::zero(Unit::MSUN));
    assert_eq!(
        out.result.vector("com_200_mean").unwrap(),
        VectorQuantity::zero(Unit::MPC)
    );
}

#[test]
fn test_particle_at_centre_counts_towards_mass() {
    let data = ParticleData::new().with_species(dark_matter(
        &on_x_axis(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
        Vec3::zeros(),
    ));
    let so = SoProperties::new(200.0, "crit", &densities(1.0e6), SnapshotUnits::default()).unwrap();
    let m = so.measure(&halo(), &data).unwrap();
    // Profile has radii 1..5 with 2..6 m0 enclosed; 3 m0 / (4 pi i^2) x (i+1)/i
    // first drops below 0.02 m0 at i = 4 (0.0187 m0)
    assert_eq!(m.so.radius.value(), 4.0);
    assert_relative_eq!(m.so.mass.value(), 5.0 * M0);
    assert_relative_eq!(m.aggregates.dark_matter_mass.value(), 4.0 * M0);
}

/// Density stays above the reference at every particle, so no crossing is
/// found inside the loaded region and the innermost entry is reported
#[test]
fn test_unenclosed_profile_cuts_at_innermost_particle() {
    let data = ParticleData::new().with_species(dark_matter(
        &on_x_axis(&[1.0, 2.0, 3.0, 4.0, 5.0]),
        Vec3::zeros(),
    ));
    // 200 x 1e-6 Msun/Mpc^3, far below 5 m0 / (4/3 pi 125)
    let so =
        SoProperties::new(200.0, "crit", &densities(1.0e-6), SnapshotUnits::default()).unwrap();
    let out = so.calculate(&halo(), &data).unwrap();
    assert!(out.radius_exhausted);
    assert_eq!(out.result.scalar("r_200_crit").unwrap(), Quantity::new(1.0, Unit::MPC));
    assert_relative_eq!(out.result.scalar("m_200_crit").unwrap().value(), M0);
    // Nothing lies strictly inside the innermost particle
    assert!(out.result.scalar("Mdm_200_crit").unwrap().is_zero());
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOT GAS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_cold_gas_gives_zero_temperature_not_nan() {
    let data = ParticleData::new()
        .with_species(dark_matter(&on_x_axis(&[0.1, 0.2, 0.3, 5.0]), Vec3::zeros()))
        .with_species(gas(&on_x_axis(&[0.15, 0.25]), &[M0, M0], &[5.0e4, 9.9e4]));
    let so = SoProperties::new(200.0, "crit", &densities(1.0e6), SnapshotUnits::default()).unwrap();
    let measured = so.measure(&halo(), &data).unwrap();
    // 6 m0 inside 5 Mpc is 0.0115 m0, below the 0.02 m0 reference
    assert_eq!(measured.so.radius.value(), 5.0);
    let m = measured.aggregates;
    assert!(m.gas_mass.value() > 0.0);
    assert!(m.hot_gas_mass.is_zero());
    assert_eq!(m.hot_gas_temperature, Quantity::zero(Unit::KELVIN));
    // X-ray sums are over all gas inside the radius
    assert!(m.xray_luminosity.value() > 0.0);
}

#[test]
fn test_missing_gas_temperature_is_fatal() {
    let bare_gas = SpeciesData::new(PartType::Gas)
        .with_vector(fields::COORDINATES, vectors(vec![centre()], Unit::MPC))
        .with_vector(fields::VELOCITIES, vectors(vec![Vec3::zeros()], Unit::KM_PER_S))
        .with_scalar(fields::MASSES, Quantities::new(vec![M0], Unit::MSUN));
    let so = SoProperties::new(200.0, "crit", &densities(1.0e6), SnapshotUnits::default()).unwrap();
    assert!(so
        .calculate(&halo(), &ParticleData::new().with_species(bare_gas))
        .is_err());
}

// ═══════════════════════════════════════════════════════════════════════════════
// RANDOM MIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

fn random_offsets(rng: &mut StdRng, n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
        })
        .collect()
}

fn random_values(rng: &mut StdRng, n: usize, lo: f64, hi: f64) -> Vec<f64> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

fn random_mixture(seed: u64) -> ParticleData {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut species = |part_type: PartType, n: usize| {
        let offsets = random_offsets(&mut rng, n);
        let velocities = random_offsets(&mut rng, n);
        let masses = random_values(&mut rng, n, 0.5, 1.5);
        let mut s = SpeciesData::new(part_type)
            .with_vector(
                fields::COORDINATES,
                vectors(offsets.iter().map(|o| centre() + o).collect(), Unit::MPC),
            )
            .with_vector(fields::VELOCITIES, vectors(velocities, Unit::KM_PER_S))
            .with_scalar(part_type.mass_dataset(), Quantities::new(masses, Unit::MSUN));
        let extra = |rng: &mut StdRng, lo, hi| random_values(rng, n, lo, hi);
        match part_type {
            PartType::Gas => {
                let temperatures = extra(&mut rng, 1.0e3, 1.0e7);
                let luminosities = extra(&mut rng, 0.0, 1.0);
                let photon_luminosities = extra(&mut rng, 0.0, 1.0);
                let compton_y = extra(&mut rng, 0.0, 1.0);
                s = s
                    .with_scalar(fields::TEMPERATURES, Quantities::new(temperatures, Unit::KELVIN))
                    .with_scalar(
                        fields::XRAY_LUMINOSITIES,
                        Quantities::new(luminosities, Unit::ERG_PER_S),
                    )
                    .with_scalar(
                        fields::XRAY_PHOTON_LUMINOSITIES,
                        Quantities::new(photon_luminosities, Unit::PER_SECOND),
                    )
                    .with_scalar(
                        fields::COMPTON_Y_PARAMETERS,
                        Quantities::new(compton_y, Unit::MPC2),
                    );
            }
            PartType::Stars => {
                let initial = extra(&mut rng, 1.0, 2.0);
                s = s.with_scalar(fields::INITIAL_MASSES, Quantities::new(initial, Unit::MSUN));
            }
            PartType::BlackHoles => {
                let subgrid = extra(&mut rng, 0.1, 0.2);
                s = s.with_scalar(fields::SUBGRID_MASSES, Quantities::new(subgrid, Unit::MSUN));
            }
            PartType::DarkMatter => {}
        }
        s
    };
    let gas = species(PartType::Gas, 120);
    let stars = species(PartType::Stars, 60);
    let black_holes = species(PartType::BlackHoles, 5);
    let mut dm = species(PartType::DarkMatter, 200);

    // A tight core guarantees the profile starts above the reference
    let core = dark_matter(&on_x_axis(&[0.01]), Vec3::zeros());
    let mut coords = dm.vector(fields::COORDINATES).unwrap().values().to_vec();
    let mut vels = dm.vector(fields::VELOCITIES).unwrap().values().to_vec();
    let mut masses = dm.scalar(fields::MASSES).unwrap().values().to_vec();
    coords.extend_from_slice(core.vector(fields::COORDINATES).unwrap().values());
    vels.push(Vec3::zeros());
    masses.push(1.0);
    dm = SpeciesData::new(PartType::DarkMatter)
        .with_vector(fields::COORDINATES, vectors(coords, Unit::MPC))
        .with_vector(fields::VELOCITIES, vectors(vels, Unit::KM_PER_S))
        .with_scalar(fields::MASSES, Quantities::new(masses, Unit::MSUN));

    ParticleData::new()
        .with_species(gas)
        .with_species(dm)
        .with_species(stars)
        .with_species(black_holes)
}

/// Direct sum of dynamical masses strictly inside `radius` Mpc of the centre
fn mass_inside(data: &ParticleData, radius: f64) -> f64 {
    data.iter()
        .map(|species| {
            let coords = species.vector(fields::COORDINATES).unwrap().values();
            let masses = species.scalar(species.part_type().mass_dataset()).unwrap().values();
            coords
                .iter()
                .zip(masses)
                .filter(|(x, _)| (*x - centre()).norm() < radius)
                .map(|(_, m)| m)
                .sum::<f64>()
        })
        .sum()
}

#[test]
fn test_species_masses_sum_to_total() {
    let so = SoProperties::new(100.0, "crit", &densities(1.0), SnapshotUnits::default()).unwrap();
    for seed in 0..8 {
        let data = random_mixture(seed);
        let m = so.measure(&halo(), &data).unwrap();
        assert!(m.so.radius.value() > 0.0, "seed {seed}");

        let agg = m.aggregates;
        let inside = mass_inside(&data, m.so.radius.value());
        assert!(inside > 0.0, "seed {seed}");
        assert_relative_eq!(agg.total_mass.value(), inside, max_relative = 1e-12);
        let sum = agg.species_mass_sum().unwrap();
        assert_relative_eq!(sum.value(), inside, max_relative = 1e-12);
        // Selection is strict, so it never exceeds the profile mass at r_SO
        assert!(agg.total_mass.value() <= m.so.mass.value());
        assert!(agg.hot_gas_mass.value() <= agg.gas_mass.value());
        if agg.hot_gas_mass.value() > 0.0 {
            assert!(agg.hot_gas_temperature.value() > 1.0e5);
        }
    }
}

#[test]
fn test_results_independent_of_species_units() {
    let data = random_mixture(99);
    let so = SoProperties::new(100.0, "crit", &densities(1.0), SnapshotUnits::default()).unwrap();
    let reference = so.measure(&halo(), &data).unwrap();

    // Same halo with dark matter coordinates in kpc
    let dm = data.get(PartType::DarkMatter).unwrap();
    let kpc = dm.vector(fields::COORDINATES).unwrap().to(Unit::KPC).unwrap();
    let rescaled = data.clone().with_species(dm.clone().with_vector(fields::COORDINATES, kpc));
    let other = so.measure(&halo(), &rescaled).unwrap();

    assert_relative_eq!(other.so.radius.value(), reference.so.radius.value(), max_relative = 1e-9);
    assert_relative_eq!(
        other.aggregates.total_mass.value(),
        reference.aggregates.total_mass.value(),
        max_relative = 1e-9
    );
}
