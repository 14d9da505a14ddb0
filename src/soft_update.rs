//! Polyak averaging between parameter stores.
//!
//! Parameters are matched by name, so the two stores must come from
//! structurally identical networks:
//!
//! ```text
//! θ_target = τ * θ_local + (1 - τ) * θ_target
//! ```

use std::collections::HashMap;
use std::sync::MutexGuard;

use candle_core::Var;
use candle_nn::VarMap;

use crate::error::{Result, Td3Error};

fn lock(vm: &VarMap) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
    vm.data().lock().map_err(|_| Td3Error::LockPoisoned)
}

fn same_store(a: &VarMap, b: &VarMap) -> bool {
    std::ptr::eq(a.data(), b.data())
}

/// Blends every parameter of `target` towards its namesake in `local`, in place.
///
/// `tau = 1` is a hard copy and `tau = 0` leaves `target` untouched.
pub fn soft_update(local: &VarMap, target: &VarMap, tau: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&tau) {
        return Err(Td3Error::InvalidConfig(format!(
            "soft update coefficient {tau} outside [0, 1]"
        )));
    }
    if same_store(local, target) {
        return Ok(());
    }

    let local_data = lock(local)?;
    let target_data = lock(target)?;
    if local_data.len() != target_data.len() {
        return Err(Td3Error::MissingParameter(format!(
            "local store has {} parameters, target has {}",
            local_data.len(),
            target_data.len()
        )));
    }

    for (name, target_var) in target_data.iter() {
        let local_var = local_data
            .get(name)
            .ok_or_else(|| Td3Error::MissingParameter(name.clone()))?;
        let blended =
            ((local_var.as_tensor() * tau)? + (target_var.as_tensor() * (1.0 - tau))?)?;
        target_var.set(&blended.detach())?;
    }
    Ok(())
}

/// Copies every parameter of `local` into `target` exactly.
pub fn hard_update(local: &VarMap, target: &VarMap) -> Result<()> {
    if same_store(local, target) {
        return Ok(());
    }

    let local_data = lock(local)?;
    let target_data = lock(target)?;
    for (name, target_var) in target_data.iter() {
        let local_var = local_data
            .get(name)
            .ok_or_else(|| Td3Error::MissingParameter(name.clone()))?;
        target_var.set(&local_var.as_tensor().detach())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_core::{DType, Device, Tensor};

    fn store(weight: &[f32], bias: &[f32]) -> VarMap {
        let vm = VarMap::new();
        {
            let mut data = vm.data().lock().unwrap();
            let w = Tensor::from_slice(weight, (1, weight.len()), &Device::Cpu).unwrap();
            let b = Tensor::from_slice(bias, bias.len(), &Device::Cpu).unwrap();
            data.insert("layer.weight".to_string(), Var::from_tensor(&w).unwrap());
            data.insert("layer.bias".to_string(), Var::from_tensor(&b).unwrap());
        }
        vm
    }

    fn values(vm: &VarMap, name: &str) -> Vec<f32> {
        let data = vm.data().lock().unwrap();
        data[name].as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn blends_by_tau() {
        let local = store(&[1.0, 2.0, 3.0], &[10.0]);
        let target = store(&[-1.0, 0.0, 5.0], &[0.0]);
        let tau = 0.02;

        soft_update(&local, &target, tau).unwrap();

        let expected: Vec<f32> = [1.0f32, 2.0, 3.0]
            .iter()
            .zip([-1.0f32, 0.0, 5.0])
            .map(|(l, t)| (tau as f32) * l + (1.0 - tau as f32) * t)
            .collect();
        for (got, want) in values(&target, "layer.weight").iter().zip(expected) {
            assert_relative_eq!(*got, want, max_relative = 1e-6);
        }
        assert_relative_eq!(values(&target, "layer.bias")[0], 0.2, max_relative = 1e-6);
        // local is never written
        assert_eq!(values(&local, "layer.weight"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn tau_one_copies_and_tau_zero_freezes() {
        let local = store(&[0.3, -0.7], &[1.5]);
        let target = store(&[9.0, 9.0], &[9.0]);

        soft_update(&local, &target, 0.0).unwrap();
        assert_eq!(values(&target, "layer.weight"), vec![9.0, 9.0]);

        soft_update(&local, &target, 1.0).unwrap();
        assert_eq!(values(&target, "layer.weight"), vec![0.3, -0.7]);
        assert_eq!(values(&target, "layer.bias"), vec![1.5]);
    }

    #[test]
    fn rejects_tau_outside_unit_interval() {
        let local = store(&[0.0], &[0.0]);
        let target = store(&[0.0], &[0.0]);
        assert!(soft_update(&local, &target, 1.5).is_err());
        assert!(soft_update(&local, &target, -0.1).is_err());
    }

    #[test]
    fn reports_missing_parameter() {
        let local = store(&[0.0], &[0.0]);
        let target = VarMap::new();
        {
            let mut data = target.data().lock().unwrap();
            let t = Tensor::zeros(1, DType::F32, &Device::Cpu).unwrap();
            data.insert("other.weight".to_string(), Var::from_tensor(&t).unwrap());
            data.insert("other.bias".to_string(), Var::from_tensor(&t).unwrap());
        }
        assert!(matches!(
            soft_update(&local, &target, 0.5),
            Err(Td3Error::MissingParameter(_))
        ));
    }

    #[test]
    fn hard_update_copies_exactly() {
        let local = store(&[0.125, 4.0], &[-2.0]);
        let target = store(&[0.0, 0.0], &[0.0]);
        hard_update(&local, &target).unwrap();
        assert_eq!(values(&target, "layer.weight"), vec![0.125, 4.0]);
        assert_eq!(values(&target, "layer.bias"), vec![-2.0]);
    }
}
