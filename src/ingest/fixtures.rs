/// Test fixtures: representative JSON payloads from the VitalWeather API.
///
/// Every endpoint wraps its payload in the same envelope:
///   { <payload>: [...], unites|units: {...}, generated_at, code, message }
///
///   stations.php       -> "stations"
///   conditions.php/ID  -> "conditions" + "units"
///   history.php        -> "History"    + "unites"
///   dailysummary.php/ID -> "dailysummary" + "unites"
///
/// `generated_at` arrives either as epoch seconds or as a naive UTC string.
/// `code` is the application status; anything but 200 is a failure even
/// when the HTTP status is 200.

/// One station, epoch `generated_at`.
#[cfg(test)]
pub(crate) fn fixture_stations_json() -> &'static str {
    r#"{
      "stations": [
        {
          "Station_ID": 123,
          "Station_Name": "Test Station",
          "latitude": -15.92883055,
          "longitude": 34.606880555,
          "height": 166.6
        }
      ],
      "generated_at": 1739811533,
      "code": 200,
      "message": "success"
    }"#
}

/// HTTP 200 carrying an application-level failure.
#[cfg(test)]
pub(crate) fn fixture_incorrect_key_json() -> &'static str {
    r#"{
      "generated_at": "2025-02-17 16:58:53",
      "code": 400,
      "message": "Incorrect KEY"
    }"#
}

/// Latest conditions for station 123, naive-UTC timestamps.
#[cfg(test)]
pub(crate) fn fixture_conditions_json() -> &'static str {
    r#"{
      "conditions": [
        {
          "ts": "2025-03-06 14:35:02",
          "pressure": 995.3,
          "temperature": 25.6,
          "humidity": 88,
          "wind_min": 0,
          "wind_average": 0.0,
          "wind_max": 3.2,
          "wind_direction": 180,
          "total_rain": 0.0,
          "uv": 25.5,
          "solar_radiation": 0.0
        }
      ],
      "units": {
        "local_time_last_update": "",
        "ts": "",
        "temperature": "°C",
        "humidity": "%",
        "pressure": "mb",
        "wind_average": "Kp/h",
        "wind_direction": "360 points",
        "total_rain": "mm",
        "solar_radiation": " W/M2",
        "FDI": ""
      },
      "generated_at": "2025-03-06 14:36:00",
      "code": 200,
      "message": "success"
    }"#
}

/// Two history readings, deliberately out of order, `unites` spelling.
#[cfg(test)]
pub(crate) fn fixture_history_json() -> &'static str {
    r#"{
      "History": [
        {
          "ts": "2025-03-06 15:00:00",
          "pressure": 995.1,
          "temperature": 26.1,
          "humidity": 85,
          "wind_min": 1,
          "wind_average": 2.4,
          "wind_max": 5.0,
          "wind_direction": 200,
          "total_rain": 0.2,
          "uv": 6.0,
          "solar_radiation": 410.0
        },
        {
          "ts": "2025-03-06 14:00:00",
          "pressure": 995.4,
          "temperature": 25.2,
          "humidity": 89,
          "wind_min": 0,
          "wind_average": 1.1,
          "wind_max": 2.9,
          "wind_direction": 190,
          "total_rain": 0.0,
          "uv": 4.5,
          "solar_radiation": 300.5
        }
      ],
      "unites": {
        "local_time_last_update": "",
        "ts": "",
        "temperature": "°C",
        "humidity": "%",
        "pressure": "mb",
        "wind_average": "Kp/h",
        "wind_direction": "360 points",
        "total_rain": "mm",
        "solar_radiation": "W/M2",
        "FDI": ""
      },
      "generated_at": 1741273200,
      "code": 200,
      "message": "success"
    }"#
}

/// Daily summary for station 123 on 2025-03-03.
#[cfg(test)]
pub(crate) fn fixture_daily_summary_json() -> &'static str {
    r#"{
      "dailysummary": [
        {
          "station_id": 123,
          "Date": "2025-03-03",
          "rain": 58.8,
          "avg_temp": 21.6,
          "min_temp": 20.6,
          "max_temp": 22.8,
          "avg_RH": 94,
          "min_RH": 92,
          "max_RH": 95,
          "avg_wind": 0.1,
          "avg_solar": 0,
          "avg_pressure": 1003.71,
          "min_pressure": 1002.51,
          "max_pressure": 1005.28,
          "avg_winddirection": [225, "SW"]
        }
      ],
      "unites": {
        "rain": "mm",
        "avg_temp": "°C",
        "max_temp": "°C",
        "min_temp": "°C",
        "avg_RH": "%",
        "max_hum": "%",
        "min_hum": "%",
        "avg_wind": "kph",
        "avg_solar": "Watts/M",
        "avg_pressure": "mb",
        "min_pressure": "mb",
        "max_pressure": "mb",
        "avg_winddirection": ["°", "DIR"]
      },
      "generated_at": 1747242490,
      "code": 200,
      "message": "success"
    }"#
}
