//! DTOs for decoding Nominatim `reverse` responses (`format=jsonv2`).
//!
//! Every field is optional on the wire. Absent address parts stay unset in
//! the domain value; only a response with neither a display name nor an
//! address block is rejected.

use serde::Deserialize;

use crate::domain::LocationDetails;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ReverseResponseDto {
    pub(super) error: Option<String>,
    pub(super) display_name: Option<String>,
    pub(super) address: Option<AddressDto>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AddressDto {
    pub(super) house_number: Option<String>,
    pub(super) road: Option<String>,
    pub(super) city: Option<String>,
    pub(super) town: Option<String>,
    pub(super) village: Option<String>,
    pub(super) municipality: Option<String>,
    pub(super) state: Option<String>,
    pub(super) postcode: Option<String>,
    pub(super) country: Option<String>,
}

impl AddressDto {
    /// Smaller settlements report `town` or `village` instead of `city`.
    fn locality(&self) -> Option<&str> {
        [&self.city, &self.town, &self.village, &self.municipality]
            .into_iter()
            .find_map(|part| non_blank(part.as_deref()))
    }

    fn street(&self) -> Option<String> {
        match (
            non_blank(self.road.as_deref()),
            non_blank(self.house_number.as_deref()),
        ) {
            (Some(road), Some(number)) => Some(format!("{road}, {number}")),
            (Some(road), None) => Some(road.to_owned()),
            _ => None,
        }
    }

    fn formatted(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.street(),
            self.locality().map(str::to_owned),
            non_blank(self.state.as_deref()).map(str::to_owned),
            non_blank(self.postcode.as_deref()).map(str::to_owned),
            non_blank(self.country.as_deref()).map(str::to_owned),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

impl ReverseResponseDto {
    /// Map into domain details for the queried coordinates.
    pub(super) fn into_location(
        self,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationDetails, String> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let display_name = non_blank(self.display_name.as_deref()).map(str::to_owned);
        let Some(address) = self.address else {
            return match display_name {
                Some(display_name) => Ok(LocationDetails {
                    display_name: Some(display_name.clone()),
                    formatted_address: Some(display_name),
                    ..LocationDetails::at(latitude, longitude)
                }),
                None => Err("response has neither display_name nor address".to_owned()),
            };
        };

        let formatted_address = address.formatted().or_else(|| display_name.clone());
        Ok(LocationDetails {
            latitude,
            longitude,
            display_name,
            city: address.locality().map(str::to_owned),
            state: non_blank(address.state.as_deref()).map(str::to_owned),
            country: non_blank(address.country.as_deref()).map(str::to_owned),
            postal_code: non_blank(address.postcode.as_deref()).map(str::to_owned),
            formatted_address,
        })
    }
}
