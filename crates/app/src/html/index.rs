pub const INDEX_HTML: &str = r#"
<!doctype html>
<html lang="en" class="h-full dark">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Wildlife Detection</title>

  <style type="text/tailwindcss">
    @theme {
      --color-field-bg: #0b1410;
      --color-field-panel: #12211a;
      --color-field-accent: #4ade80;
      --color-field-danger: #fb7185;
    }

    @layer base {
      html { @apply h-full; }
      body { @apply min-h-full bg-field-bg text-slate-100 font-sans; }
      [x-cloak] { display: none !important; }
    }

    @layer components {
      .panel { @apply rounded-xl border border-field-accent/20 bg-field-panel p-4 shadow-lg; }
      .label { @apply text-xs uppercase tracking-widest text-slate-400; }
    }
  </style>
  <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  <script defer src="https://cdn.jsdelivr.net/npm/alpinejs@3.13.5/dist/cdn.min.js" crossorigin="anonymous"></script>
</head>

<body x-data="detector()" x-init="init()">
  <main class="mx-auto flex max-w-6xl flex-col gap-4 p-6">
    <header class="flex items-baseline justify-between">
      <h1 class="text-2xl font-semibold text-field-accent">Wildlife Detection</h1>
      <span class="label">backend: {{BACKEND}}</span>
    </header>

    <section class="panel grid gap-4 md:grid-cols-3">
      <div class="flex flex-col gap-2">
        <span class="label">Image source</span>
        <label class="flex items-center gap-2">
          <input type="radio" name="source" value="camera" x-model="source" @change="sourceChanged()" /> Camera
        </label>
        <label class="flex items-center gap-2">
          <input type="radio" name="source" value="upload" x-model="source" @change="sourceChanged()" /> Upload
        </label>
      </div>

      <div class="flex flex-col gap-3">
        <label class="flex flex-col gap-1">
          <span class="label">Confidence threshold <span x-text="Number(conf).toFixed(2)"></span></span>
          <input id="conf" type="range" min="0.05" max="0.95" step="0.05" value="{{DEFAULT_CONF}}" x-model="conf" />
        </label>
        <label class="flex flex-col gap-1">
          <span class="label">IOU threshold <span x-text="Number(iou).toFixed(2)"></span></span>
          <input id="iou" type="range" min="0.10" max="0.90" step="0.05" value="{{DEFAULT_IOU}}" x-model="iou" />
        </label>
      </div>

      <div class="flex flex-col justify-end gap-2">
        <template x-if="source === 'upload'">
          <input type="file" accept="image/*" @change="fileChosen($event)"
            class="text-sm file:mr-3 file:rounded file:border-0 file:bg-field-accent file:px-3 file:py-1 file:text-black" />
        </template>
        <button type="button" @click="run()" :disabled="busy"
          class="rounded-lg bg-field-accent px-4 py-2 font-semibold text-black disabled:opacity-50">
          <span x-text="busy ? 'Detecting...' : 'Run detection'"></span>
        </button>
        <p class="text-sm text-field-danger" x-show="error" x-text="error" x-cloak></p>
      </div>
    </section>

    <section class="grid gap-4 md:grid-cols-2">
      <figure class="panel flex flex-col gap-2">
        <figcaption class="label">Input</figcaption>
        <video x-ref="video" autoplay playsinline muted class="w-full rounded" x-show="source === 'camera' && !inputUrl"></video>
        <img :src="inputUrl" x-show="inputUrl" class="w-full rounded" alt="input image" x-cloak />
      </figure>
      <figure class="panel flex flex-col gap-2">
        <figcaption class="label">Annotated</figcaption>
        <img :src="annotatedUrl" x-show="annotatedUrl" class="w-full rounded" alt="annotated image" x-cloak />
      </figure>
    </section>

    <section class="panel flex flex-col gap-2" x-show="result" x-cloak>
      <span class="label">Detections</span>
      <p x-show="result && result.message" x-text="result && result.message"></p>
      <ul class="list-disc pl-6">
        <template x-for="line in (result ? result.lines : [])">
          <li x-text="line"></li>
        </template>
      </ul>
      <details>
        <summary class="cursor-pointer text-sm text-slate-400">Raw response</summary>
        <pre class="overflow-auto text-xs" x-text="JSON.stringify(result ? result.raw : null, null, 2)"></pre>
      </details>
    </section>
  </main>

  <script>
    function detector() {
      return {
        source: 'camera',
        conf: '{{DEFAULT_CONF}}',
        iou: '{{DEFAULT_IOU}}',
        file: null,
        stream: null,
        busy: false,
        error: '',
        result: null,
        inputUrl: '',
        annotatedUrl: '',

        init() {
          this.sourceChanged();
        },

        async sourceChanged() {
          this.error = '';
          this.inputUrl = '';
          if (this.source === 'camera') {
            try {
              this.stream = await navigator.mediaDevices.getUserMedia({ video: true });
              this.$refs.video.srcObject = this.stream;
            } catch (err) {
              this.error = 'Camera unavailable: ' + err;
            }
          } else if (this.stream) {
            this.stream.getTracks().forEach((track) => track.stop());
            this.stream = null;
          }
        },

        fileChosen(event) {
          this.file = event.target.files[0] || null;
          this.inputUrl = this.file ? URL.createObjectURL(this.file) : '';
        },

        snapshot() {
          const video = this.$refs.video;
          if (!video.videoWidth) {
            return Promise.resolve(null);
          }
          const canvas = document.createElement('canvas');
          canvas.width = video.videoWidth;
          canvas.height = video.videoHeight;
          canvas.getContext('2d').drawImage(video, 0, 0);
          return new Promise((resolve) => canvas.toBlob(resolve, 'image/jpeg', 0.92));
        },

        async run() {
          this.error = '';
          const body = this.source === 'camera' ? await this.snapshot() : this.file;
          if (!body) {
            this.error = 'Please capture or upload an image first.';
            return;
          }
          this.busy = true;
          try {
            const params = new URLSearchParams({ conf: this.conf, iou: this.iou, source: this.source });
            const response = await fetch('/detect?' + params, { method: 'POST', body });
            const payload = await response.json();
            if (!response.ok) {
              this.error = payload.error || ('HTTP ' + response.status);
              return;
            }
            this.result = payload;
            const frame = payload.frame_number;
            this.inputUrl = '/frame.jpg?kind=input&frame=' + frame;
            this.annotatedUrl = '/frame.jpg?kind=annotated&frame=' + frame;
          } catch (err) {
            this.error = 'Request failed: ' + err;
          } finally {
            this.busy = false;
          }
        },
      };
    }
  </script>
</body>

</html>
"#;
