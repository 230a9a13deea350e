//! Credential region backed by an NVS blob

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::*;
use plantnode_mcu::storage::REGION_SIZE;
use plantnode_mcu::NvRegion;

const NVS_NAMESPACE: &str = "plantnode";
const KEY_REGION: &str = "region";

pub struct NvsRegion {
    nvs: EspNvs<NvsDefault>,
}

impl NvsRegion {
    pub fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl NvRegion for NvsRegion {
    type Error = esp_idf_svc::sys::EspError;

    fn read(&self, image: &mut [u8; REGION_SIZE]) -> Result<(), Self::Error> {
        let mut buf = [0u8; REGION_SIZE];
        image.fill(0);
        match self.nvs.get_blob(KEY_REGION, &mut buf)? {
            Some(data) => {
                if data.len() != REGION_SIZE {
                    warn!("Credential blob is {} bytes, expected {REGION_SIZE}", data.len());
                }
                let n = data.len().min(REGION_SIZE);
                image[..n].copy_from_slice(&data[..n]);
            }
            None => info!("No credential blob in NVS"),
        }
        Ok(())
    }

    fn commit(&mut self, image: &[u8; REGION_SIZE]) -> Result<(), Self::Error> {
        // set_blob commits before returning
        self.nvs.set_blob(KEY_REGION, image)
    }
}
